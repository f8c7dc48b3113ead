//! Tests for the per-connection request loop.

use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bson::doc;
use docket_config::{MirrorEndpoint, Mode};
use docket_wire::{OpCode, OpMsg};
use rstest::rstest;

use super::*;
use crate::dispatch::{Command, CommandContext, CommandTable, HandlerError};
use crate::metrics::ConnMetrics;
use crate::operation::OperationRegistry;
use crate::tests::support::{
    FakeMirror, MirrorBehaviour, exchange, msg_document, msg_frame, raw_frame,
};

fn explode(_context: &CommandContext<'_>, _msg: &OpMsg) -> Result<OpMsg, HandlerError> {
    panic!("handler exploded");
}

fn table() -> Arc<CommandTable> {
    let mut table = CommandTable::with_builtins(Arc::new(OperationRegistry::new()));
    table.register(Command {
        name: "explode",
        help: "Panics.",
        handler: explode,
    });
    Arc::new(table)
}

fn serve(token: &CancellationToken) -> (UnixStream, JoinHandle<ConnectionError>) {
    serve_in(Mode::LocalOnly, None, token)
}

fn serve_in(
    mode: Mode,
    mirror: Option<&MirrorEndpoint>,
    token: &CancellationToken,
) -> (UnixStream, JoinHandle<ConnectionError>) {
    let (client, server) = UnixStream::pair().expect("socket pair");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("client read timeout");
    let router =
        ModeRouter::new(mode, mirror, table(), Arc::new(ConnMetrics::new())).expect("router");
    let connection = Connection::new(
        ConnectionStream::Unix(server),
        router,
        ConnectionInfo::default(),
        None,
    );
    let token = token.clone();
    (client, thread::spawn(move || connection.run(&token)))
}

#[rstest]
fn answers_in_order_until_the_client_leaves() {
    let token = CancellationToken::new();
    let (mut client, handle) = serve(&token);

    let (first, body) = exchange(&mut client, &msg_frame(7, doc! { "ping": 1, "$db": "test" }));
    let (second, _) = exchange(&mut client, &msg_frame(8, doc! { "ping": 1, "$db": "test" }));
    client.shutdown(Shutdown::Write).expect("half close");

    assert_eq!(first.response_to, 7);
    assert_eq!(first.op_code, OpCode::Msg);
    assert_eq!(msg_document(&body).get_f64("ok").expect("ok"), 1.0);
    assert!(second.request_id > first.request_id);
    let outcome = handle.join().expect("join connection");
    assert!(outcome.is_clean_eof(), "{outcome}");
}

#[rstest]
#[case::truncated_header(vec![0x20, 0, 0])]
#[case::short_length(vec![8, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0xdd, 0x07, 0, 0])]
#[case::truncated_body({
    let mut frame = msg_frame(1, doc! { "ping": 1 });
    frame.truncate(frame.len() - 3);
    frame
})]
fn malformed_streams_end_with_a_read_error(#[case] bytes: Vec<u8>) {
    let token = CancellationToken::new();
    let (mut client, handle) = serve(&token);

    client.write_all(&bytes).expect("write bytes");
    client.shutdown(Shutdown::Write).expect("half close");

    let outcome = handle.join().expect("connection never panics out");
    assert!(matches!(outcome, ConnectionError::Read(_)), "{outcome}");
}

#[rstest]
fn unsupported_op_codes_request_a_close() {
    let token = CancellationToken::new();
    let (mut client, handle) = serve(&token);

    client
        .write_all(&raw_frame(4, OpCode::Insert, vec![0; 8]))
        .expect("write insert");

    let outcome = handle.join().expect("join connection");
    assert!(
        matches!(outcome, ConnectionError::CloseRequested { request_id: 4 }),
        "{outcome}"
    );
}

#[rstest]
fn handler_panics_end_only_the_connection() {
    let token = CancellationToken::new();
    let (mut client, handle) = serve(&token);

    client
        .write_all(&msg_frame(2, doc! { "explode": 1, "$db": "test" }))
        .expect("write request");

    let outcome = handle.join().expect("panic is contained");
    match outcome {
        ConnectionError::Panic { message } => assert_eq!(message, "handler exploded"),
        other => panic!("expected a panic outcome, got {other}"),
    }
}

#[rstest]
fn cancellation_unblocks_a_pending_read() {
    let token = CancellationToken::new();
    let (_client, handle) = serve(&token);
    thread::sleep(Duration::from_millis(50));

    token.cancel(CancelCause::Shutdown);

    let outcome = handle.join().expect("join connection");
    assert!(
        matches!(
            outcome,
            ConnectionError::Cancelled {
                cause: CancelCause::Shutdown
            }
        ),
        "{outcome}"
    );
}

#[rstest]
#[case::mirror_only(Mode::MirrorOnly)]
#[case::dual(Mode::DualPreferLocal)]
fn cancellation_unblocks_a_pending_mirror_relay(#[case] mode: Mode) {
    let mirror = FakeMirror::start(MirrorBehaviour::Silent);
    let token = CancellationToken::new();
    let (mut client, handle) = serve_in(mode, Some(&mirror.endpoint()), &token);

    client
        .write_all(&msg_frame(5, doc! { "ping": 1, "$db": "test" }))
        .expect("write request");
    let deadline = Instant::now() + Duration::from_secs(5);
    while mirror.received().is_empty() {
        assert!(Instant::now() < deadline, "mirror never saw the request");
        thread::sleep(Duration::from_millis(5));
    }

    token.cancel(CancelCause::Shutdown);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "connection still blocked on the mirror");
        thread::sleep(Duration::from_millis(5));
    }
    let outcome = handle.join().expect("join connection");
    assert!(
        matches!(
            outcome,
            ConnectionError::Cancelled {
                cause: CancelCause::Shutdown
            }
        ),
        "{outcome}"
    );
}
