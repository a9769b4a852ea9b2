use std::net::SocketAddr;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "echo-client")]
#[command(about = "Send one line to an echo server and print the reply", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:13000")]
    addr: SocketAddr,

    #[arg(short, long, default_value = "Hello.")]
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut stream = TcpStream::connect(cli.addr).await?;

    stream.write_all(cli.message.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    println!("{}", line.trim_end_matches(['\r', '\n']));

    Ok(())
}
