mod common;

use std::collections::HashSet;

use common::{enrolled_tags, run_round, server, server_with, tag_with};
use pufauth_refimpl::{Message, ProtocolConfig, ReaderId, ServerState, TagState};

#[test]
fn auth_100_tags_in_sequence() {
    let s = server();
    let mut tags = enrolled_tags(&s, 100);
    for t in tags.iter_mut() {
        run_round(&s, t, ReaderId(0)).expect("round");
        assert_eq!(t.state(), TagState::Idle);
    }
    assert_eq!(s.active_sessions(), 0);
}

#[test]
fn auth_100_tags_interleaved_on_distinct_readers() {
    let s = server();
    let mut tags = enrolled_tags(&s, 100);

    let mut m2s = Vec::new();
    for (i, t) in tags.iter_mut().enumerate() {
        let m1 = s.dispatch(&Message::MInit, ReaderId(i as u64)).unwrap();
        m2s.push(t.handle(&m1).unwrap().unwrap());
    }
    assert_eq!(s.active_sessions(), 100);

    let mut m4s = Vec::new();
    for (i, t) in tags.iter_mut().enumerate() {
        let m3 = s.dispatch(&m2s[i], ReaderId(i as u64)).unwrap();
        m4s.push(t.handle(&m3).unwrap().unwrap());
    }

    // Finish in reverse order; channels must not depend on each other.
    for (i, t) in tags.iter_mut().enumerate().rev() {
        let m5 = s.dispatch(&m4s[i], ReaderId(i as u64)).unwrap();
        assert!(t.handle(&m5).unwrap().is_none());
    }
    assert_eq!(s.active_sessions(), 0);
}

#[test]
fn one_tag_100_rounds_never_reuses_sid() {
    let s = server();
    let mut t = enrolled_tags(&s, 1).pop().unwrap();
    let mut seen = HashSet::new();
    seen.insert(t.sid().unwrap());
    for _ in 0..100 {
        run_round(&s, &mut t, ReaderId(0)).expect("round");
        assert!(seen.insert(t.sid().unwrap()), "sid reused");
    }
}

#[test]
fn both_sides_agree_on_rotated_identity() {
    let s = server();
    let mut t = enrolled_tags(&s, 1).pop().unwrap();
    let old = t.sid().unwrap();
    let old_record = s.identity(&old).unwrap();

    run_round(&s, &mut t, ReaderId(9)).unwrap();

    let new = t.sid().unwrap();
    assert_ne!(new, old);
    let record = s.identity(&new).expect("server provisioned the tag's new sid");
    assert_eq!(record.challenge.len(), s.config().challenge_width());
    assert_ne!(record.challenge, old_record.challenge);
    assert_eq!(t.respond(&record.challenge).unwrap(), record.response);
}

#[test]
fn rounds_complete_across_threads() {
    let s = server();
    let tags = enrolled_tags(&s, 16);
    std::thread::scope(|scope| {
        for (i, mut t) in tags.into_iter().enumerate() {
            let s = &s;
            scope.spawn(move || {
                for _ in 0..10 {
                    run_round(s, &mut t, ReaderId(i as u64)).expect("round");
                }
            });
        }
    });
    assert_eq!(s.active_sessions(), 0);
}

#[test]
fn round_survives_wire_encoding() {
    let s = server();
    let mut t = enrolled_tags(&s, 1).pop().unwrap();
    let r = ReaderId(5);
    let over_wire = |m: Message| Message::decode(&m.encode()).expect("decode");

    let m1 = over_wire(s.dispatch(&Message::MInit, r).unwrap());
    let m2 = over_wire(t.handle(&m1).unwrap().unwrap());
    let m3 = over_wire(s.dispatch(&m2, r).unwrap());
    let m4 = over_wire(t.handle(&m3).unwrap().unwrap());
    let m5 = over_wire(s.dispatch(&m4, r).unwrap());
    assert!(t.handle(&m5).unwrap().is_none());
    assert!(s.identity(&t.sid().unwrap()).is_some());
}

#[test]
fn wider_parameters_work() {
    let cfg = ProtocolConfig::new(128, 32).unwrap();
    let s = server_with(cfg.clone(), 3);
    let mut t = tag_with(&cfg, 42);
    s.enroll(&mut t, 42).unwrap();
    for _ in 0..5 {
        run_round(&s, &mut t, ReaderId(1)).unwrap();
    }
    assert_eq!(s.session_state(ReaderId(1)), ServerState::AwaitingInit);
}
