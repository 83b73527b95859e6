//! Two full sessions talking over an in-process radio medium.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use loralink::pipe::MessagePipe;
use loralink::radio::testing::FallibleLocalRadio;
use loralink::radio::{LocalRadio, RadioPort};
use loralink::session::{AgentAction, Session, SessionRole};
use loralink::types::{Payload, SessionId};

const TRANSMIT_TIME: Duration = Duration::from_millis(10);
const GAP_TIME: Duration = Duration::from_millis(5);
const LEAD_TIME: Duration = Duration::from_millis(100);

/// A pipe producing numbered messages with a fixed prefix and recording
/// every delivered payload.
fn tagged_pipe(tag: &'static str) -> (MessagePipe, Arc<Mutex<Vec<Payload>>>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let counter = AtomicU32::new(0);
    let pipe = MessagePipe::new(
        move || {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            Payload::from_slice(format!("{tag} {n}").as_bytes())
        },
        move |payload| sink.lock().push(payload),
    );
    (pipe, delivered)
}

fn prefixed_count(delivered: &Mutex<Vec<Payload>>, prefix: &[u8]) -> usize {
    delivered
        .lock()
        .iter()
        .filter(|p| p.as_bytes().starts_with(prefix))
        .count()
}

#[test]
fn ping_pong_over_an_ideal_radio() {
    let radio: Arc<dyn RadioPort> = Arc::new(LocalRadio::new(Duration::from_millis(8)));
    let start_time = Instant::now() + LEAD_TIME;

    let (mut ping_pipe, ping_delivered) = tagged_pipe("PING");
    let (mut pong_pipe, pong_delivered) = tagged_pipe("PONG");

    let mut pinger = Session::new(
        start_time,
        SessionId(0),
        TRANSMIT_TIME,
        GAP_TIME,
        SessionRole::Initiator,
    );
    let mut ponger = Session::new(
        start_time,
        SessionId(0),
        TRANSMIT_TIME,
        GAP_TIME,
        SessionRole::Follower,
    );

    const PERIODS: usize = 4;

    let ponger_radio = Arc::clone(&radio);
    let ponger_thread = thread::spawn(move || {
        ponger.sleep_until_start_time();
        for i in 0..PERIODS {
            assert_eq!(
                ponger.execute_current_action(ponger_radio.as_ref(), &mut pong_pipe),
                AgentAction::TransmitNextMessage,
                "ponger period {i} (A)"
            );
            assert_eq!(
                ponger.execute_current_action(ponger_radio.as_ref(), &mut pong_pipe),
                AgentAction::Receive,
                "ponger period {i} (B)"
            );
        }
        ponger
    });

    pinger.sleep_until_start_time();
    for i in 0..PERIODS {
        assert_eq!(
            pinger.execute_current_action(radio.as_ref(), &mut ping_pipe),
            AgentAction::Receive,
            "pinger period {i} (A)"
        );
        assert_eq!(
            pinger.execute_current_action(radio.as_ref(), &mut ping_pipe),
            AgentAction::TransmitNextMessage,
            "pinger period {i} (B)"
        );
    }

    let ponger = ponger_thread.join().unwrap();

    // Delivery lags one packet behind: a payload is handed up only when the
    // next sequence number supersedes it, so 4 accepted packets yield 3
    // tagged deliveries (plus the empty bootstrap payload).
    assert_eq!(prefixed_count(&pong_delivered, b"PING"), 3);
    assert_eq!(prefixed_count(&ping_delivered, b"PONG"), 3);
    assert_eq!(ponger.stats().payloads_delivered, 4);
    assert_eq!(ponger.stats().messages_sent as usize, PERIODS);
    assert_eq!(pinger.stats().payloads_delivered, 4);
}

#[test]
fn ping_pong_with_periodic_transmit_loss() {
    // Drop every 4th transmission across the shared medium. The first loss
    // is the follower's second send, so from its second period on the
    // follower alternates fresh transmissions with retransmissions while
    // the initiator alternates fresh transmissions with NACKs.
    let radio: Arc<dyn RadioPort> =
        Arc::new(FallibleLocalRadio::new(Duration::from_millis(8), 4, 0));
    let start_time = Instant::now() + LEAD_TIME;

    let (mut ping_pipe, _ping_delivered) = tagged_pipe("PING");
    let (mut pong_pipe, _pong_delivered) = tagged_pipe("PONG");

    let mut pinger = Session::new(
        start_time,
        SessionId(0),
        TRANSMIT_TIME,
        GAP_TIME,
        SessionRole::Initiator,
    );
    let mut ponger = Session::new(
        start_time,
        SessionId(0),
        TRANSMIT_TIME,
        GAP_TIME,
        SessionRole::Follower,
    );

    const PERIODS: usize = 8;

    let ponger_radio = Arc::clone(&radio);
    let ponger_thread = thread::spawn(move || {
        ponger.sleep_until_start_time();
        for i in 0..PERIODS {
            let transmit_action = if i > 1 && (i + 1) % 2 == 1 {
                AgentAction::RetransmitMessage
            } else {
                AgentAction::TransmitNextMessage
            };
            assert_eq!(
                ponger.execute_current_action(ponger_radio.as_ref(), &mut pong_pipe),
                transmit_action,
                "ponger period {i} (A)"
            );
            assert_eq!(
                ponger.execute_current_action(ponger_radio.as_ref(), &mut pong_pipe),
                AgentAction::Receive,
                "ponger period {i} (B)"
            );
        }
    });

    pinger.sleep_until_start_time();
    for i in 0..PERIODS {
        let transmit_action = if (i + 1) % 2 == 1 {
            AgentAction::TransmitNextMessage
        } else {
            AgentAction::TransmitNack
        };
        assert_eq!(
            pinger.execute_current_action(radio.as_ref(), &mut ping_pipe),
            AgentAction::Receive,
            "pinger period {i} (A)"
        );
        assert_eq!(
            pinger.execute_current_action(radio.as_ref(), &mut ping_pipe),
            transmit_action,
            "pinger period {i} (B)"
        );
    }

    ponger_thread.join().unwrap();
}
