//! End-to-end station behaviour against a scripted module.

mod common;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use common::{commands, session, ScriptedTransport};
use rylr_at::{Address, InboundMessage, OutboundMessage};
use rylr_session::{
    DisabledExecutor, Dispatcher, Executor, ExecutorError, RunMode, SessionError, Station, StationStats,
};

/// Answers every command line with the line itself.
#[derive(Default)]
struct ParrotExecutor {
    calls: Vec<String>,
}

impl Executor for ParrotExecutor {
    fn execute(&mut self, command_line: &str) -> Result<Vec<u8>, ExecutorError> {
        self.calls.push(command_line.to_string());
        Ok(command_line.as_bytes().to_vec())
    }
}

/// Answers with multi-line output.
struct ListingExecutor;

impl Executor for ListingExecutor {
    fn execute(&mut self, _command_line: &str) -> Result<Vec<u8>, ExecutorError> {
        Ok(b"a.txt\r\nb.txt\nc.txt\n".to_vec())
    }
}

fn station<E: Executor>(
    transport: ScriptedTransport,
    executor: E,
    mode: RunMode,
) -> (Station<ScriptedTransport, E>, std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>) {
    let (session, written) = session(transport);
    let station = Station::new(session, Dispatcher::new(executor), mode)
        .with_idle_poll(Duration::from_millis(20));
    (station, written)
}

#[test]
fn test_ping_gets_pong_on_the_wire() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=12,4,ping,-80,10\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    assert_eq!(station.poll_once().unwrap(), 1);
    assert_eq!(written.borrow().as_slice(), [b"AT+SEND=12,5,pong!\r\n".to_vec()]);
    assert_eq!(station.stats().replies_sent, 1);
}

#[test]
fn test_empty_payload_is_echoed_empty() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=7,0,,-90,5\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    station.poll_once().unwrap();
    assert_eq!(written.borrow().as_slice(), [b"AT+SEND=7,0,\r\n".to_vec()]);
}

#[test]
fn test_command_output_is_flattened() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=3,2,ls,-60,9\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, ListingExecutor, RunMode::Receiver);

    station.poll_once().unwrap();
    assert_eq!(commands(&written), vec!["AT+SEND=3,15,a.txtb.txtc.txt"]);
}

#[test]
fn test_disabled_executor_reply() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=3,6,reboot,-60,9\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    station.poll_once().unwrap();
    assert_eq!(
        commands(&written),
        vec!["AT+SEND=3,28,remote execution is disabled"]
    );
}

#[test]
fn test_framing_error_does_not_affect_later_lines() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=1,40,short,-1,1\r\n+RCV=12,4,ping,-80,10\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    assert_eq!(station.poll_once().unwrap(), 1);
    let stats = station.stats();
    assert_eq!(stats.framing_errors, 1);
    assert_eq!(stats.messages_received, 1);
    assert_eq!(commands(&written), vec!["AT+SEND=12,5,pong!"]);
}

#[test]
fn test_line_split_across_reads() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=12,4,pi", "ng,-80", ",10\r\n"])
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    assert_eq!(station.poll_once().unwrap(), 1);
    assert_eq!(commands(&written), vec!["AT+SEND=12,5,pong!"]);
}

#[test]
fn test_reply_failure_does_not_stop_the_loop() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=12,4,ping,-80,10\r\n+RCV=13,4,ping,-81,9\r\n"])
        .silent()
        .reply(&["+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    assert_eq!(station.poll_once().unwrap(), 2);
    let stats = station.stats();
    assert_eq!(stats.reply_failures, 1);
    assert_eq!(stats.replies_sent, 1);
    assert_eq!(
        commands(&written),
        vec!["AT+SEND=12,5,pong!", "AT+SEND=13,5,pong!"]
    );
}

#[test]
fn test_module_error_on_reply_is_counted() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=12,4,ping,-80,10\r\n"])
        .reply(&["+ERR=10\r\n"]);
    let (mut station, _) = station(transport, DisabledExecutor, RunMode::Receiver);

    station.poll_once().unwrap();
    assert_eq!(station.stats().reply_failures, 1);
}

#[test]
fn test_unrelated_lines_are_ignored() {
    let transport = ScriptedTransport::new().incoming(&["+READY\r\n+OK\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);

    assert_eq!(station.poll_once().unwrap(), 0);
    assert_eq!(station.stats().lines_received, 2);
    assert!(written.borrow().is_empty());
}

#[test]
fn test_idle_poll_returns_nothing() {
    let (mut station, _) = station(ScriptedTransport::new(), DisabledExecutor, RunMode::Receiver);
    assert_eq!(station.poll_once().unwrap(), 0);
    assert_eq!(station.poll_once().unwrap(), 0);
}

#[test]
fn test_transport_failure_ends_poll() {
    let (mut station, _) = station(
        ScriptedTransport::new().broken(),
        DisabledExecutor,
        RunMode::Receiver,
    );
    let err = station.poll_once().unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
}

#[test]
fn test_payloads_with_commas_reach_executor_intact() {
    let payloads = ["a,b", ",", "x,,y,", "1,2,3,-4,5", "end,"];
    let mut transport = ScriptedTransport::new();
    let mut chunks = Vec::new();
    for payload in payloads {
        let line = InboundMessage::new(Address::new(9), payload, -50, 7)
            .unwrap()
            .encode();
        chunks.push(format!("{}\r\n", String::from_utf8(line).unwrap()));
        transport = transport.reply(&["+OK\r\n"]);
    }
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
    transport = transport.incoming(&chunk_refs);

    let (mut station, written) = station(transport, ParrotExecutor::default(), RunMode::Receiver);
    let mut handled = 0;
    while handled < payloads.len() {
        let n = station.poll_once().unwrap();
        assert!(n > 0, "ran out of input after {} messages", handled);
        handled += n;
    }

    let expected: Vec<String> = payloads
        .iter()
        .map(|p| format!("AT+SEND=9,{},{}", p.len(), p))
        .collect();
    assert_eq!(commands(&written), expected);
    assert_eq!(station.stats().framing_errors, 0);
}

#[test]
fn test_sender_mode_never_replies() {
    let transport = ScriptedTransport::new().incoming(&["+RCV=12,4,ping,-80,10\r\n"]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Sender);

    assert_eq!(station.poll_once().unwrap(), 1);
    assert!(written.borrow().is_empty());
}

#[test]
fn test_send_and_await_returns_peer_reply() {
    let transport = ScriptedTransport::new().reply(&[
        "+OK\r\n",
        "+RCV=5,3,hey,-70,3\r\n",
        "+RCV=12,5,pong!,-80,10\r\n+RCV=5,2,hi,-70,3\r\n",
    ]);
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Sender);

    let ping = OutboundMessage::new(Address::new(12), b"ping".to_vec()).unwrap();
    let reply = station.send_and_await(&ping).unwrap().unwrap();
    assert_eq!(reply.sender(), Address::new(12));
    assert_eq!(reply.payload(), b"pong!");
    assert_eq!(commands(&written), vec!["AT+SEND=12,4,ping"]);

    // The message after the reply is still delivered.
    assert_eq!(station.poll_once().unwrap(), 1);
    assert_eq!(station.stats().messages_received, 3);
}

#[test]
fn test_send_and_await_times_out() {
    let transport = ScriptedTransport::new().reply(&["+OK\r\n"]);
    let (mut station, _) = station(transport, DisabledExecutor, RunMode::Sender);

    let ping = OutboundMessage::new(Address::new(12), b"ping".to_vec()).unwrap();
    assert!(station.send_and_await(&ping).unwrap().is_none());
}

#[test]
fn test_run_stops_on_shutdown() {
    let (mut station, _) = station(ScriptedTransport::new(), DisabledExecutor, RunMode::Receiver);
    let shutdown = AtomicBool::new(true);
    station.run(&shutdown).unwrap();
    assert_eq!(station.stats(), StationStats::default());
}

#[test]
fn test_run_returns_transport_error() {
    let transport = ScriptedTransport::new()
        .incoming(&["+RCV=12,4,ping,-80,10\r\n"])
        .reply(&["+OK\r\n"])
        .broken();
    let (mut station, written) = station(transport, DisabledExecutor, RunMode::Receiver);
    let shutdown = AtomicBool::new(false);

    let err = station.run(&shutdown).unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(commands(&written), vec!["AT+SEND=12,5,pong!"]);
}
