//! Loopback stand-in for a mirror server.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bson::Document;
use docket_config::MirrorEndpoint;
use docket_wire::{MsgBody, MsgHeader, OpCode, OpMsg, decode_header, read_frame, write_message};

/// How the fake mirror treats each frame it receives.
#[derive(Debug, Clone)]
pub enum MirrorBehaviour {
    /// Answers with an `OP_MSG` holding this document.
    Reply(Document),
    /// Reads frames but never answers.
    Silent,
    /// Closes the connection after reading a frame.
    HangUp,
}

/// Mirror server answering on a loopback port.
pub struct FakeMirror {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl FakeMirror {
    /// Starts a mirror answering every frame with `document`.
    pub fn replying(document: Document) -> Self {
        Self::start(MirrorBehaviour::Reply(document))
    }

    /// Starts a mirror with the given behaviour.
    pub fn start(behaviour: MirrorBehaviour) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind fake mirror");
        listener
            .set_nonblocking(true)
            .expect("set fake mirror non-blocking");
        let addr = listener.local_addr().expect("fake mirror address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_received = Arc::clone(&received);
        let thread_stop = Arc::clone(&stop);
        let accept_thread = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let behaviour = behaviour.clone();
                        let received = Arc::clone(&thread_received);
                        thread::spawn(move || serve(stream, &behaviour, &received));
                    }
                    Err(_) => thread::sleep(Duration::from_millis(5)),
                }
            }
        });

        Self {
            addr,
            received,
            stop,
            accept_thread: Some(accept_thread),
        }
    }

    /// Plain TCP endpoint of this mirror.
    pub fn endpoint(&self) -> MirrorEndpoint {
        MirrorEndpoint::plain(self.addr.to_string())
    }

    /// Raw frames received so far, in arrival order.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().expect("received frames lock").clone()
    }
}

impl Drop for FakeMirror {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            handle.join().expect("join fake mirror accept thread");
        }
    }
}

fn serve(mut stream: TcpStream, behaviour: &MirrorBehaviour, received: &Mutex<Vec<Vec<u8>>>) {
    stream
        .set_nonblocking(false)
        .expect("set mirror connection blocking");
    let mut response_id = 1000;
    while let Ok(frame) = read_frame(&mut stream) {
        let request_id = decode_header(&frame).map_or(0, |header| header.request_id);
        received.lock().expect("received frames lock").push(frame);
        match behaviour {
            MirrorBehaviour::Reply(document) => {
                response_id += 1;
                let header = MsgHeader::response(OpCode::Msg, response_id, request_id);
                let body = MsgBody::Msg(OpMsg::new(document.clone()));
                if write_message(&mut stream, &header, &body).is_err() || stream.flush().is_err() {
                    return;
                }
            }
            MirrorBehaviour::Silent => {}
            MirrorBehaviour::HangUp => return,
        }
    }
}
