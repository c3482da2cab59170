//! Remote command client
//!
//! Sends a single command line to a running `eye_exec` over its remote endpoint and prints the
//! response line, for example:
//!
//! ```text
//! eye_remote tcp://localhost:5020 SAC 10 -5 X X
//! ```

use eye_if::{
    cmd::Response,
    net::{zmq, MonitoredSocket, SocketOptions},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        println!("Usage: {} <endpoint> <command...>", args[0]);
        std::process::exit(2);
    }

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: 5000,
        send_timeout: 1000,
        ..Default::default()
    };

    let socket = match MonitoredSocket::new(&ctx, zmq::REQ, socket_options, &args[1]) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the controller");
            return Err(e.into());
        }
    };

    let line = args[2..].join(" ");
    socket.send_line(&line)?;

    match socket.recv_line()? {
        Some(Ok(r)) => {
            println!("{}", r);
            match Response::from_line(&r) {
                Some(resp) if resp.is_ok() => Ok(()),
                _ => std::process::exit(1),
            }
        }
        Some(Err(_)) => {
            println!("Non UTF-8 response");
            std::process::exit(1)
        }
        None => {
            println!("No response from the controller");
            std::process::exit(1)
        }
    }
}
