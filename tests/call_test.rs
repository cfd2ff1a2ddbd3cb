//! End-to-end call flow over live WebSockets: request, accept, WebRTC
//! relay, and teardown on disconnect.

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

mod common;
use common::*;

#[tokio::test]
async fn full_call_lifecycle_with_disconnect_teardown() {
    let server = start_test_server().await;
    let (mut a_write, mut a_read) = connect_user(&server, "alice", "Alice").await;
    let (mut b_write, mut b_read) = connect_user(&server, "bob", "Bob").await;
    wait_for_event(&mut a_read, "online_users").await;
    wait_for_event(&mut b_read, "online_users").await;

    // Alice rings bob
    send_frame(
        &mut a_write,
        json!({
            "request_id": "call-1",
            "event": "video_call_request",
            "data": {"target_user_id": "bob"}
        }),
    )
    .await;
    let incoming = wait_for_event(&mut b_read, "incoming_call").await;
    assert_eq!(incoming["data"]["caller_id"], "alice");
    assert_eq!(incoming["data"]["caller_name"], "Alice");
    let ack = wait_for_event(&mut a_read, "ack").await;
    assert_eq!(ack["request_id"], "call-1");

    // Bob accepts; both get call_connected naming the same room
    send_frame(
        &mut b_write,
        json!({
            "event": "video_call_accepted",
            "data": {"caller_id": "alice"}
        }),
    )
    .await;
    let a_connected = wait_for_event(&mut a_read, "call_connected").await;
    let b_connected = wait_for_event(&mut b_read, "call_connected").await;
    assert_eq!(a_connected["data"]["room_id"], "alice-bob");
    assert_eq!(
        a_connected["data"]["room_id"],
        b_connected["data"]["room_id"]
    );
    assert_eq!(a_connected["data"]["participants"].as_array().unwrap().len(), 2);

    // Alice's SDP offer reaches bob, stamped with the sender identity
    send_frame(
        &mut a_write,
        json!({
            "event": "webrtc_offer",
            "data": {"target_user_id": "bob", "sdp": {"type": "offer", "sdp": "v=0..."}}
        }),
    )
    .await;
    let offer = wait_for_event(&mut b_read, "webrtc_offer").await;
    assert_eq!(offer["data"]["from"], "alice");
    assert_eq!(offer["data"]["sdp"]["type"], "offer");

    // Bob answers back
    send_frame(
        &mut b_write,
        json!({
            "event": "webrtc_answer",
            "data": {"target_user_id": "alice", "sdp": {"type": "answer", "sdp": "v=0..."}}
        }),
    )
    .await;
    let answer = wait_for_event(&mut a_read, "webrtc_answer").await;
    assert_eq!(answer["data"]["from"], "bob");

    // ICE candidates relay both ways
    send_frame(
        &mut a_write,
        json!({
            "event": "webrtc_ice_candidate",
            "data": {"target_user_id": "bob", "candidate": {"candidate": "candidate:0 1 UDP ..."}}
        }),
    )
    .await;
    let candidate = wait_for_event(&mut b_read, "webrtc_ice_candidate").await;
    assert_eq!(candidate["data"]["from"], "alice");

    // Alice drops; bob hears the call end
    a_write.send(Message::Close(None)).await.unwrap();
    let ended = wait_for_event(&mut b_read, "call_ended").await;
    assert_eq!(ended["data"]["room_id"], "alice-bob");
    assert_eq!(ended["data"]["reason"], "participant_left");
}

#[tokio::test]
async fn rejected_call_notifies_the_caller() {
    let server = start_test_server().await;
    let (mut a_write, mut a_read) = connect_user(&server, "alice", "Alice").await;
    let (mut b_write, mut b_read) = connect_user(&server, "bob", "Bob").await;
    wait_for_event(&mut a_read, "online_users").await;
    wait_for_event(&mut b_read, "online_users").await;

    send_frame(
        &mut a_write,
        json!({
            "event": "video_call_request",
            "data": {"target_user_id": "bob"}
        }),
    )
    .await;
    wait_for_event(&mut b_read, "incoming_call").await;

    send_frame(
        &mut b_write,
        json!({
            "event": "video_call_rejected",
            "data": {"caller_id": "alice", "reason": "in a meeting"}
        }),
    )
    .await;
    let rejected = wait_for_event(&mut a_read, "call_rejected").await;
    assert_eq!(rejected["data"]["rejecter_id"], "bob");
    assert_eq!(rejected["data"]["reason"], "in a meeting");
}

#[tokio::test]
async fn calling_an_offline_user_fails_with_code() {
    let server = start_test_server().await;
    let (mut a_write, mut a_read) = connect_user(&server, "alice", "Alice").await;
    wait_for_event(&mut a_read, "online_users").await;

    send_frame(
        &mut a_write,
        json!({
            "request_id": "call-1",
            "event": "video_call_request",
            "data": {"target_user_id": "nobody"}
        }),
    )
    .await;
    let err = wait_for_event(&mut a_read, "call_error").await;
    assert_eq!(err["request_id"], "call-1");
    assert_eq!(err["data"]["code"], "USER_OFFLINE");
}

#[tokio::test]
async fn busy_callee_rejects_a_second_caller() {
    let server = start_test_server().await;
    let (mut a_write, mut a_read) = connect_user(&server, "alice", "Alice").await;
    let (mut b_write, mut b_read) = connect_user(&server, "bob", "Bob").await;
    let (mut c_write, mut c_read) = connect_user(&server, "carol", "Carol").await;
    wait_for_event(&mut a_read, "online_users").await;
    wait_for_event(&mut b_read, "online_users").await;
    wait_for_event(&mut c_read, "online_users").await;

    send_frame(
        &mut a_write,
        json!({"event": "video_call_request", "data": {"target_user_id": "bob"}}),
    )
    .await;
    wait_for_event(&mut b_read, "incoming_call").await;
    send_frame(
        &mut b_write,
        json!({"event": "video_call_accepted", "data": {"caller_id": "alice"}}),
    )
    .await;
    wait_for_event(&mut a_read, "call_connected").await;
    wait_for_event(&mut b_read, "call_connected").await;

    send_frame(
        &mut c_write,
        json!({
            "request_id": "call-2",
            "event": "video_call_request",
            "data": {"target_user_id": "bob"}
        }),
    )
    .await;
    let err = wait_for_event(&mut c_read, "call_error").await;
    assert_eq!(err["request_id"], "call-2");
    assert_eq!(err["data"]["code"], "USER_BUSY");
}

#[tokio::test]
async fn generic_signal_requires_a_shared_call() {
    let server = start_test_server().await;
    let (mut a_write, mut a_read) = connect_user(&server, "alice", "Alice").await;
    let (_b_write, mut b_read) = connect_user(&server, "bob", "Bob").await;
    wait_for_event(&mut a_read, "online_users").await;
    wait_for_event(&mut b_read, "online_users").await;

    // No call between them: generic signal is refused
    send_frame(
        &mut a_write,
        json!({
            "request_id": "sig-1",
            "event": "webrtc_signal",
            "data": {"target_user_id": "bob", "signal": {"type": "renegotiate"}}
        }),
    )
    .await;
    let err = wait_for_event(&mut a_read, "call_error").await;
    assert_eq!(err["request_id"], "sig-1");
    assert_eq!(err["data"]["code"], "SIGNAL_ERROR");
    expect_silence(&mut b_read).await;
}
