mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use spdy::frame::{
    ControlFrame, GoAway, Ping, SessionStatus, SettingKey, Settings, StreamId, StreamStatus,
    SynReply, SynStream, SynStreamFlags, WindowUpdate,
};
use spdy::{CloseState, Config, DataInfo, Generator, Headers, OperationError, SynInfo, Version};

use support::{
    session, session_with, CountingListener, RecordingFrameListener, RecordingStreamListener,
};

fn peer_syn_stream(generator: &mut Generator, version: Version, id: u32, fin: bool) -> Vec<u8> {
    let mut headers = Headers::new();
    headers.add(":method", "GET");
    let frame = SynStream {
        version,
        stream_id: StreamId::new(id),
        associated_stream_id: StreamId::ZERO,
        priority: 0,
        slot: 0,
        flags: if fin {
            SynStreamFlags::FIN
        } else {
            SynStreamFlags::empty()
        },
        headers,
    };
    generator.control(&frame.into()).unwrap().to_vec()
}

// Scenario: client opens one stream.
#[test]
fn client_opens_one_stream() {
    let _ = env_logger::try_init();
    let (session, controller) = session(1);

    let mut headers = Headers::new();
    headers.add(":method", "GET");
    let stream = session
        .syn(
            Version::V2,
            SynInfo::new(headers.clone(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();

    assert_eq!(controller.write_count(), 1);
    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::SynStream(frame)] => {
            assert_eq!(frame.version, Version::V2);
            assert_eq!(frame.stream_id, 1);
            assert!(frame.flags.is_empty());
            assert_eq!(frame.headers, headers);
        }
        other => panic!("unexpected frames {:?}", other),
    }

    assert_eq!(stream.id(), 1);
    assert_eq!(stream.close_state(), CloseState::Open);
    let streams = session.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].id(), 1);
}

#[test]
fn outbound_stream_ids_increase_monotonically() {
    let (session, controller) = session(1);

    for expected in [1u32, 3, 5] {
        let stream = session
            .syn(
                Version::V3,
                SynInfo::new(Headers::new(), false),
                Arc::new(RecordingStreamListener::default()),
            )
            .unwrap();
        assert_eq!(stream.id(), expected);
    }

    let ids: Vec<u32> = controller
        .decoded()
        .control_frames()
        .iter()
        .map(|frame| match frame {
            ControlFrame::SynStream(f) => f.stream_id.value(),
            other => panic!("unexpected frame {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

// Scenario: duplicate inbound stream id.
#[test]
fn duplicate_inbound_stream_id_resets_existing() {
    let listener = Arc::new(RecordingFrameListener::default());
    let counting = Arc::new(CountingListener::default());
    let (session, controller) = session_with(1, Some(listener.clone()), Config::default());
    session.add_listener(counting.clone());

    let mut peer = Generator::new();
    session.feed(&peer_syn_stream(&mut peer, Version::V2, 2, false));
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);
    assert_eq!(controller.write_count(), 0);

    session.feed(&peer_syn_stream(&mut peer, Version::V2, 2, false));
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);

    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::Reset(reset)] => {
            assert_eq!(reset.stream_id, 2);
            assert_eq!(reset.status, StreamStatus::ProtocolError);
            assert_eq!(reset.version, Version::V2);
        }
        other => panic!("unexpected frames {:?}", other),
    }
}

// Scenario: data on unknown stream.
#[test]
fn data_on_unknown_stream_is_reset() {
    let (session, controller) = session(1);

    let payload = vec![0x01, 0x02, 0x03, 0x04, 0x05];
    let data = Generator::data(StreamId::new(99), 5, &mut DataInfo::new(payload, false));
    session.feed(&data);

    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::Reset(reset)] => {
            assert_eq!(reset.stream_id, 99);
            assert_eq!(reset.status, StreamStatus::InvalidStream);
            // No version is discoverable without a stream; the default
            // stands in
            assert_eq!(reset.version, Version::V2);
        }
        other => panic!("unexpected frames {:?}", other),
    }
}

// Scenario: flow-control stall and resume.
#[test]
fn data_stalls_on_zero_window_and_resumes() {
    let config = Config::default().initial_window_size(10);
    let (session, controller) = session_with(1, None, config);

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();
    assert_eq!(controller.write_count(), 1);

    stream
        .data(DataInfo::new(vec![0xAA; 30], false))
        .unwrap();

    // Only the first window's worth goes out
    assert_eq!(controller.write_count(), 2);
    assert_eq!(stream.window_size(), 0);

    // Repeated flushing emits nothing while the window is exhausted
    session.flush();
    session.flush();
    assert_eq!(controller.write_count(), 2);

    let mut peer = Generator::new();
    session.feed(
        &peer
            .control(&WindowUpdate::new(Version::V3, stream.id(), 20).into())
            .unwrap(),
    );

    assert_eq!(controller.write_count(), 3);
    assert_eq!(stream.window_size(), 0);

    let data = controller.decoded().data_frames();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].1.len(), 10);
    assert!(!data[0].0.is_fin());
    assert_eq!(data[1].1.len(), 20);
    assert!(!data[1].0.is_fin());
}

#[test]
fn fin_travels_with_the_last_chunk() {
    let config = Config::default().initial_window_size(10);
    let (session, controller) = session_with(1, None, config);

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();
    stream.data(DataInfo::new(vec![0xBB; 15], true)).unwrap();

    let mut peer = Generator::new();
    session.feed(
        &peer
            .control(&WindowUpdate::new(Version::V3, stream.id(), 10).into())
            .unwrap(),
    );

    let data = controller.decoded().data_frames();
    assert_eq!(data.len(), 2);
    assert!(!data[0].0.is_fin());
    assert_eq!(data[0].1.len(), 10);
    assert!(data[1].0.is_fin());
    assert_eq!(data[1].1.len(), 5);

    assert_eq!(stream.close_state(), CloseState::HalfClosedLocal);
}

#[test]
fn v2_streams_have_no_flow_control() {
    let config = Config::default().initial_window_size(10);
    let (session, controller) = session_with(1, None, config);

    let stream = session
        .syn(
            Version::V2,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();
    stream.data(DataInfo::new(vec![0xCC; 100], false)).unwrap();

    let data = controller.decoded().data_frames();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].1.len(), 100);
}

// Scenario: PING echo vs reply.
#[test]
fn peer_ping_is_echoed_own_ping_is_delivered() {
    let listener = Arc::new(RecordingFrameListener::default());
    let (session, controller) = session_with(1, Some(listener.clone()), Config::default());

    let mut peer = Generator::new();
    session.feed(&peer.control(&Ping::new(Version::V2, 2).into()).unwrap());

    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::Ping(ping)] => assert_eq!(ping.ping_id, 2),
        other => panic!("unexpected frames {:?}", other),
    }
    assert!(listener.pings.lock().is_empty());

    let before = controller.write_count();
    session.feed(&peer.control(&Ping::new(Version::V2, 3).into()).unwrap());
    assert_eq!(controller.write_count(), before);
    assert_eq!(listener.pings.lock()[0].ping_id, 3);
}

#[test]
fn ping_allocates_ids_with_local_parity() {
    let (session, controller) = session(1);

    assert_eq!(session.ping(Version::V3).unwrap().ping_id, 1);
    assert_eq!(session.ping(Version::V3).unwrap().ping_id, 3);

    let frames = controller.decoded().control_frames();
    assert_eq!(frames.len(), 2);
}

// Scenario: GO_AWAY suppression.
#[test]
fn local_go_away_is_suppressed_after_peer_go_away() {
    let listener = Arc::new(RecordingFrameListener::default());
    let (session, controller) = session_with(1, Some(listener.clone()), Config::default());

    let mut peer = Generator::new();
    session.feed(
        &peer
            .control(&GoAway::new(Version::V3, StreamId::ZERO, SessionStatus::Ok).into())
            .unwrap(),
    );
    assert_eq!(listener.go_aways.lock().len(), 1);

    session.go_away(Version::V3);
    assert_eq!(controller.write_count(), 0);
    assert_eq!(*controller.closed.lock(), None);
}

#[test]
fn go_away_reports_last_accepted_peer_stream() {
    let listener = Arc::new(RecordingFrameListener {
        reply_with_fin: true,
        ..Default::default()
    });
    let (session, controller) = session_with(1, Some(listener), Config::default());

    // Peer stream 2 opens half-closed; the syn callback replies with a
    // FIN, fully closing it
    let mut peer = Generator::new();
    session.feed(&peer_syn_stream(&mut peer, Version::V3, 2, true));
    assert!(session.streams().is_empty());

    session.go_away(Version::V3);
    assert_eq!(*controller.closed.lock(), Some(true));

    let frames = controller.decoded().control_frames();
    match frames.last() {
        Some(ControlFrame::GoAway(go_away)) => {
            assert_eq!(go_away.last_stream_id, 2);
            assert_eq!(go_away.status, SessionStatus::Ok);
        }
        other => panic!("unexpected frame {:?}", other),
    }
}

#[test]
fn no_new_streams_after_go_away() {
    let (session, _controller) = session(1);
    session.go_away(Version::V3);

    let result = session.syn(
        Version::V3,
        SynInfo::new(Headers::new(), false),
        Arc::new(RecordingStreamListener::default()),
    );
    assert!(matches!(result, Err(OperationError::Closed)));
}

#[test]
fn unidirectional_syn_is_unsupported() {
    let (session, _controller) = session(1);
    let mut info = SynInfo::new(Headers::new(), false);
    info.unidirectional = true;

    let result = session.syn(
        Version::V3,
        info,
        Arc::new(RecordingStreamListener::default()),
    );
    assert!(matches!(result, Err(OperationError::Unidirectional)));
}

// ===== inbound stream traffic =====

#[test]
fn inbound_syn_installs_stream_listener() {
    let listener = Arc::new(RecordingFrameListener::default());
    let counting = Arc::new(CountingListener::default());
    let (session, _controller) = session_with(1, Some(listener.clone()), Config::default());
    session.add_listener(counting.clone());

    let mut peer = Generator::new();
    session.feed(&peer_syn_stream(&mut peer, Version::V3, 2, false));

    assert_eq!(listener.syns.lock().len(), 1);
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);
    assert_eq!(session.streams().len(), 1);

    // Payload is delivered to the listener installed by on_syn
    session.feed(&Generator::data(
        StreamId::new(2),
        100,
        &mut DataInfo::new(&b"abc"[..], true),
    ));
    assert_eq!(*listener.stream_listener.data.lock(), vec![(3, true)]);

    let stream = &session.streams()[0];
    assert_eq!(stream.close_state(), CloseState::HalfClosedRemote);
}

#[test]
fn synchronously_closed_inbound_stream_is_removed() {
    let listener = Arc::new(RecordingFrameListener {
        reply_with_fin: true,
        ..Default::default()
    });
    let counting = Arc::new(CountingListener::default());
    let (session, controller) = session_with(1, Some(listener), Config::default());
    session.add_listener(counting.clone());

    let mut peer = Generator::new();
    session.feed(&peer_syn_stream(&mut peer, Version::V3, 2, true));

    assert!(session.streams().is_empty());
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);
    assert_eq!(counting.closed.load(Ordering::SeqCst), 1);

    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::SynReply(reply)] => {
            assert_eq!(reply.stream_id, 2);
            assert!(reply.fin);
        }
        other => panic!("unexpected frames {:?}", other),
    }
}

#[test]
fn reply_is_delivered_once_and_duplicates_reset() {
    let (session, controller) = session(1);
    let stream_listener = Arc::new(RecordingStreamListener::default());
    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            stream_listener.clone(),
        )
        .unwrap();

    let mut peer = Generator::new();
    let reply = |fin| SynReply {
        version: Version::V3,
        stream_id: StreamId::new(1),
        fin,
        headers: Headers::new(),
    };
    session.feed(&peer.control(&reply(false).into()).unwrap());
    assert_eq!(stream_listener.replies.lock().len(), 1);
    assert_eq!(stream.close_state(), CloseState::Open);

    session.feed(&peer.control(&reply(false).into()).unwrap());
    assert_eq!(stream_listener.replies.lock().len(), 1);

    let frames = controller.decoded().control_frames();
    match frames.last() {
        Some(ControlFrame::Reset(reset)) => {
            assert_eq!(reset.stream_id, 1);
            assert_eq!(reset.status, StreamStatus::StreamInUse);
        }
        other => panic!("unexpected frame {:?}", other),
    }
    assert!(stream.is_closed());
}

#[test]
fn data_on_remotely_closed_stream_is_reset() {
    let (session, controller) = session(1);
    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();

    session.feed(&Generator::data(
        stream.id(),
        100,
        &mut DataInfo::new(&b"eof"[..], true),
    ));
    assert_eq!(stream.close_state(), CloseState::HalfClosedRemote);

    session.feed(&Generator::data(
        stream.id(),
        100,
        &mut DataInfo::new(&b"late"[..], false),
    ));

    let frames = controller.decoded().control_frames();
    match frames.last() {
        Some(ControlFrame::Reset(reset)) => {
            assert_eq!(reset.stream_id, 1);
            assert_eq!(reset.status, StreamStatus::ProtocolError);
        }
        other => panic!("unexpected frame {:?}", other),
    }
}

#[test]
fn inbound_rst_closes_and_removes_the_stream() {
    let listener = Arc::new(RecordingFrameListener::default());
    let counting = Arc::new(CountingListener::default());
    let (session, _controller) = session_with(1, Some(listener.clone()), Config::default());
    session.add_listener(counting.clone());

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();

    let mut peer = Generator::new();
    session.feed(
        &peer
            .control(
                &spdy::frame::Reset::new(Version::V3, stream.id(), StreamStatus::CancelStream)
                    .into(),
            )
            .unwrap(),
    );

    assert!(stream.is_closed());
    assert!(session.streams().is_empty());
    assert_eq!(counting.closed.load(Ordering::SeqCst), 1);
    assert_eq!(listener.rsts.lock()[0].status, StreamStatus::CancelStream);
}

#[test]
fn settings_change_the_initial_window_for_new_streams() {
    let (session, _controller) = session(1);

    let mut settings = Settings::new(Version::V3);
    settings
        .settings
        .insert(SettingKey::new(SettingKey::INITIAL_WINDOW_SIZE), 50);
    let mut peer = Generator::new();
    session.feed(&peer.control(&settings.into()).unwrap());

    let stream = session
        .syn(
            Version::V3,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();
    assert_eq!(stream.window_size(), 50);
}

#[test]
fn malformed_stream_frame_is_answered_with_rst() {
    let (session, controller) = session(1);

    // v3 SYN_STREAM with an undefined flag bit set
    let buf = [
        0x80, 0x03, 0x00, 0x01, 0x80, 0x00, 0x00, 0x0A, //
        0x00, 0x00, 0x00, 0x07, //
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00,
    ];
    session.feed(&buf);

    let frames = controller.decoded().control_frames();
    match &frames[..] {
        [ControlFrame::Reset(reset)] => {
            assert_eq!(reset.stream_id, 7);
            assert_eq!(reset.status, StreamStatus::ProtocolError);
            assert_eq!(reset.version, Version::V3);
        }
        other => panic!("unexpected frames {:?}", other),
    }
}

#[test]
fn failed_syn_unregisters_the_stream() {
    let (session, controller) = session(1);

    // v2 length prefixes are 16 bit; this value cannot be encoded
    let mut headers = Headers::new();
    headers.add("x-large", "v".repeat(70_000));

    let result = session.syn(
        Version::V2,
        SynInfo::new(headers, false),
        Arc::new(RecordingStreamListener::default()),
    );
    assert!(result.is_err());
    assert!(session.streams().is_empty());
    assert_eq!(controller.write_count(), 0);

    // The id space keeps advancing; the session stays usable
    let stream = session
        .syn(
            Version::V2,
            SynInfo::new(Headers::new(), false),
            Arc::new(RecordingStreamListener::default()),
        )
        .unwrap();
    assert_eq!(stream.id(), 3);
}

#[test]
fn panicking_listener_does_not_abort_dispatch() {
    struct PanickyListener;

    impl spdy::SessionListener for PanickyListener {
        fn on_stream_created(&self, _stream: &spdy::StreamRef) {
            panic!("listener bug");
        }
    }

    let counting = Arc::new(CountingListener::default());
    let (session, _controller) = session(1);
    session.add_listener(Arc::new(PanickyListener));
    session.add_listener(counting.clone());

    let mut peer = Generator::new();
    session.feed(&peer_syn_stream(&mut peer, Version::V3, 2, false));

    // The panic is swallowed; later listeners and the stream survive
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);
    assert_eq!(session.streams().len(), 1);
}

#[test]
fn window_update_for_unknown_stream_is_ignored() {
    let (session, controller) = session(1);

    let mut peer = Generator::new();
    session.feed(
        &peer
            .control(&WindowUpdate::new(Version::V3, StreamId::new(41), 100).into())
            .unwrap(),
    );
    assert_eq!(controller.write_count(), 0);
}
