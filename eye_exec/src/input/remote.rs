//! # Remote Input
//!
//! The remote pointer interface sends one command line per ZeroMQ request and gets the response
//! line back as the reply. The socket is REP, so once a request has been received it is not
//! polled again until its response has been sent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use super::{InputError, InputSource, Request};
use eye_if::{
    cmd::Response,
    net::{zmq, MonitoredSocket, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Remote input source.
pub struct RemoteInput {
    socket: MonitoredSocket,

    endpoint: String,

    /// A request has been received and its response hasn't been sent yet
    awaiting_reply: bool,

    was_connected: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RemoteInput {
    /// Bind the remote socket on the given endpoint.
    ///
    /// This function does not wait for a client to connect.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, InputError> {
        let socket_options = SocketOptions {
            bind: true,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 0,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, endpoint)
            .map_err(InputError::SocketError)?;

        info!("Remote input listening on {}", endpoint);

        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
            awaiting_reply: false,
            was_connected: false,
        })
    }
}

impl InputSource for RemoteInput {
    fn name(&self) -> &str {
        &self.endpoint
    }

    fn poll(&mut self) -> Result<Option<Request>, InputError> {
        let connected = self.socket.connected();
        if connected != self.was_connected {
            info!(
                "Remote client {}",
                if connected { "connected" } else { "disconnected" }
            );
            self.was_connected = connected;
        }

        if self.awaiting_reply {
            return Ok(None);
        }

        match self.socket.try_recv_line() {
            Ok(Some(Ok(line))) => {
                self.awaiting_reply = true;
                Ok(Some(Request::Line(line)))
            }
            Ok(Some(Err(_))) => {
                // REP must answer every request, even unreadable ones
                warn!("Remote sent a request which was not valid UTF-8");
                self.awaiting_reply = true;
                self.respond(&Response::err("PARSE request is not valid UTF-8"))?;
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(InputError::RecvError(e)),
        }
    }

    fn respond(&mut self, response: &Response) -> Result<(), InputError> {
        if !self.awaiting_reply {
            warn!("Dropping response with no pending remote request: {}", response);
            return Ok(());
        }

        self.awaiting_reply = false;

        self.socket
            .send_line(&response.to_string())
            .map_err(InputError::SendError)
    }
}
