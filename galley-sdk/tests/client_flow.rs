//! End-to-end client flows over an in-memory wire.
//!
//! The far side of the wire plays the vendor service: it receives the
//! adapter's frames and scripts responses, so the whole path from wire
//! frame to event bus is exercised without a network.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;

use galley_sdk::{
    ApplianceId, ApplianceType, ChatTransport, Client, ClientConfig, ClientError, ConnectionState,
    Credentials, ErdCode, ErdValue, Event, EventFilter, EventStream, SocketTransport, StaticDial,
    Wire,
};

const TICK: Duration = Duration::from_secs(2);

async fn recv_frame(far: &mut Wire) -> Value {
    let frame = timeout(TICK, far.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("wire closed");
    serde_json::from_str(&frame).expect("frame is json")
}

async fn next_event(events: &mut EventStream) -> Event {
    timeout(TICK, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
}

fn appliance_list(items: &[(&str, bool)]) -> String {
    json!({
        "kind": "websocket#api",
        "id": "List-appliances",
        "code": 200,
        "body": {
            "kind": "appliance#applianceList",
            "items": items.iter().map(|(id, online)| json!({
                "applianceId": id,
                "online": if *online { "ONLINE" } else { "OFFLINE" },
            })).collect::<Vec<_>>(),
        },
    })
    .to_string()
}

fn erd_list(id: &str, appliance: &str, entries: &[(&str, &str)]) -> String {
    json!({
        "kind": "websocket#api",
        "id": id,
        "code": 200,
        "body": {
            "kind": "appliance#erdList",
            "applianceId": appliance,
            "items": entries.iter().map(|(erd, value)| json!({
                "erd": erd,
                "value": value,
            })).collect::<Vec<_>>(),
        },
    })
    .to_string()
}

fn publish_erd(appliance: &str, erd: &str, value: &str) -> String {
    json!({
        "kind": "publish#erd",
        "item": {"applianceId": appliance, "erd": erd, "value": value},
        "resource": format!("/appliance/{appliance}/erd/{erd}"),
    })
    .to_string()
}

/// Connect a client over the socket transport and drain the handshake:
/// the subscribe frame, the appliance-list frame, and the `Connected`
/// event.
async fn connected_client() -> (Client, Wire, EventStream) {
    let (near, mut far) = Wire::pair(64);
    let config = ClientConfig::default().with_request_timeout(Duration::from_millis(250));
    let mut client = Client::new(config).unwrap();
    let mut events = client.subscribe(EventFilter::all());

    let credentials = Credentials::new("user123", "api.example", "secret");
    client
        .connect(SocketTransport::new(StaticDial::new(near)), &credentials)
        .await
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let subscribe = recv_frame(&mut far).await;
    assert_eq!(subscribe["kind"], "websocket#subscribe");
    let list = recv_frame(&mut far).await;
    assert_eq!(list["path"], "/v1/appliance");

    assert!(matches!(next_event(&mut events).await, Event::Connected));
    (client, far, events)
}

#[tokio::test]
async fn publish_fires_updated_and_state_changed() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(publish_erd("d828c9fba1b2", "0x5205", "002d"))
        .await
        .unwrap();

    // First sighting registers the appliance and requests its cache.
    match next_event(&mut events).await {
        Event::ApplianceAdded { appliance } => {
            assert_eq!(appliance.id(), &ApplianceId::new("d828c9fba1b2"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    let refresh = recv_frame(&mut far).await;
    assert_eq!(refresh["path"], "/v1/appliance/d828c9fba1b2/erd");

    match next_event(&mut events).await {
        Event::ApplianceUpdated { changed, .. } => {
            assert_eq!(changed.get(&ErdCode(0x5205)).map(String::as_str), Some("002d"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match next_event(&mut events).await {
        Event::ApplianceStateChanged { appliance, changed } => {
            assert_eq!(changed.len(), 1);
            let decoded = appliance
                .get_value(client.codec(), ErdCode(0x5205))
                .unwrap()
                .unwrap();
            assert_eq!(
                decoded,
                ErdValue::Minutes(Some(Duration::from_secs(45 * 60)))
            );
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn full_cache_classifies_exactly_once() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("d828c9fba1b2", true)]))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    let refresh = recv_frame(&mut far).await;
    let corr = refresh["id"].as_str().unwrap().to_string();

    far.send(erd_list(
        &corr,
        "d828c9fba1b2",
        &[("0x0008", "07"), ("0x5205", "002d")],
    ))
    .await
    .unwrap();

    match next_event(&mut events).await {
        Event::ApplianceClassified {
            appliance,
            appliance_type,
        } => {
            assert_eq!(appliance_type, ApplianceType::Oven);
            assert_eq!(appliance.appliance_type(), Some(ApplianceType::Oven));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceUpdated { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceStateChanged { .. }
    ));

    // The same table again: an update, but never a second classification.
    far.send(erd_list(
        &corr,
        "d828c9fba1b2",
        &[("0x0008", "07"), ("0x5205", "002d")],
    ))
    .await
    .unwrap();

    match next_event(&mut events).await {
        Event::ApplianceUpdated { changed, .. } => assert!(changed.is_empty()),
        other => panic!("unexpected event: {other:?}"),
    }
    // No classification, no state change queued behind it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut stream_rest = Vec::new();
    while let Some(event) = events.try_recv() {
        stream_rest.push(event);
    }
    assert!(
        stream_rest.iter().all(|e| !matches!(
            e,
            Event::ApplianceClassified { .. } | Event::ApplianceStateChanged { .. }
        )),
        "unexpected events: {stream_rest:?}"
    );

    let appliance = client.appliance(&ApplianceId::new("d828c9fba1b2")).unwrap();
    assert!(appliance.is_available());
}

#[tokio::test]
async fn illegal_set_value_fails_synchronously_and_sends_nothing() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("d828c9fba1b2", true)]))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    recv_frame(&mut far).await; // auto refresh

    let id = ApplianceId::new("d828c9fba1b2");

    // Wrong variant for the property's type.
    let err = client
        .set_property_value(&id, ErdCode::SABBATH_MODE, &ErdValue::Int(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Encode(_)));

    // A fallback enum variant outside the closed set.
    let err = client
        .set_property_value(
            &id,
            ErdCode::APPLIANCE_TYPE,
            &ErdValue::ApplianceType(ApplianceType::Unknown),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Encode(_)));

    // Nothing went out on the wire.
    assert!(timeout(Duration::from_millis(100), far.recv()).await.is_err());
}

#[tokio::test]
async fn set_property_value_resolves_with_the_echoed_confirmation() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("d828c9fba1b2", true)]))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    recv_frame(&mut far).await; // auto refresh

    let id = ApplianceId::new("d828c9fba1b2");
    let value = ErdValue::Minutes(Some(Duration::from_secs(45 * 60)));

    let set = client.set_property_value(&id, ErdCode::UPPER_OVEN_KITCHEN_TIMER, &value);
    let script = async {
        let frame = recv_frame(&mut far).await;
        assert_eq!(frame["method"], "POST");
        assert_eq!(frame["body"]["value"], "002d");
        let corr = frame["id"].as_str().unwrap().to_string();
        far.send(
            json!({
                "kind": "websocket#api",
                "id": corr,
                "code": 200,
                "body": {
                    "kind": "appliance#erdListEntry",
                    "applianceId": "d828c9fba1b2",
                    "erd": "5205",
                    "value": "002d",
                },
            })
            .to_string(),
        )
        .await
        .unwrap();
    };

    let (confirmed, ()) = tokio::join!(set, script);
    assert_eq!(confirmed.unwrap(), value);

    // The confirmation also landed in the cache.
    let appliance = client.appliance(&id).unwrap();
    assert_eq!(
        appliance.get_raw(ErdCode::UPPER_OVEN_KITCHEN_TIMER).as_deref(),
        Some("002d")
    );
}

#[tokio::test]
async fn request_times_out_without_a_response() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("d828c9fba1b2", true)]))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    recv_frame(&mut far).await; // auto refresh

    let id = ApplianceId::new("d828c9fba1b2");
    let err = client
        .request_property_update(&id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Request(galley_sdk::RequestError::Timeout)
    ));

    // The request frame did go out; the reply just never came.
    let frame = recv_frame(&mut far).await;
    assert_eq!(frame["method"], "GET");
}

#[tokio::test]
async fn late_response_after_timeout_degrades_to_a_push() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("d828c9fba1b2", true)]))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    recv_frame(&mut far).await; // auto refresh

    let id = ApplianceId::new("d828c9fba1b2");
    let err = client.request_property_update(&id, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));

    let frame = recv_frame(&mut far).await;
    let corr = frame["id"].as_str().unwrap().to_string();

    // The response finally shows up. It is applied as a push: the cache
    // updates and events fire, but nobody is resolved twice.
    far.send(erd_list(&corr, "d828c9fba1b2", &[("0x5205", "002d")]))
        .await
        .unwrap();

    match next_event(&mut events).await {
        Event::ApplianceUpdated { changed, .. } => {
            assert!(changed.contains_key(&ErdCode(0x5205)));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn operations_on_unseen_ids_do_not_create_placeholders() {
    let (client, _far, _events) = connected_client().await;

    let id = ApplianceId::new("eeeeeeeeeeee");
    assert!(matches!(
        client.request_property_update(&id, None).await,
        Err(ClientError::UnknownAppliance(_))
    ));
    assert!(matches!(
        client
            .set_property_value(&id, ErdCode::SABBATH_MODE, &ErdValue::Bool(Some(true)))
            .await,
        Err(ClientError::UnknownAppliance(_))
    ));
    assert!(client.appliance(&id).is_none());
    assert!(client.appliances().is_empty());
}

#[tokio::test]
async fn disconnect_marks_appliances_unavailable_and_keeps_caches() {
    let (client, mut far, mut events) = connected_client().await;

    far.send(appliance_list(&[("aaaaaaaaaaaa", true), ("bbbbbbbbbbbb", true)]))
        .await
        .unwrap();
    for _ in 0..2 {
        assert!(matches!(
            next_event(&mut events).await,
            Event::ApplianceAdded { .. }
        ));
        recv_frame(&mut far).await; // auto refresh per appliance
    }

    far.send(publish_erd("aaaaaaaaaaaa", "0x5205", "002d"))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceUpdated { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceStateChanged { .. }
    ));

    // The service goes away.
    drop(far);

    assert!(matches!(next_event(&mut events).await, Event::Disconnected));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let appliances = client.appliances();
    assert_eq!(appliances.len(), 2);
    assert!(appliances.iter().all(|a| !a.is_available()));

    // Stale-but-present beats empty: cached values remain queryable.
    let appliance = client.appliance(&ApplianceId::new("aaaaaaaaaaaa")).unwrap();
    assert_eq!(
        appliance.get_raw(ErdCode(0x5205)).as_deref(),
        Some("002d")
    );

    // Exactly one Disconnected.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn chat_transport_drives_the_same_engine() {
    let (near, mut far) = Wire::pair(64);
    let config = ClientConfig::default()
        .with_request_timeout(Duration::from_millis(250))
        .with_refresh_on_add(false);
    let mut client = Client::new(config).unwrap();
    let mut events = client.subscribe(EventFilter::all());

    let credentials = Credentials::new("user123", "chat.example", "secret");
    client
        .connect(ChatTransport::new(StaticDial::new(near)), &credentials)
        .await
        .unwrap();

    // Presence handshake, then Connected.
    let presence = timeout(TICK, far.recv()).await.unwrap().unwrap();
    assert!(presence.starts_with("<presence"));
    assert!(matches!(next_event(&mut events).await, Event::Connected));

    // A push stanza flows through codec, cache and bus like any other.
    far.send(
        "<message from=\"d828c9fba1b2_user123@chat.example\" id=\"0\">\
         <body><request><id>0</id><method>PUBLISH</method>\
         <uri>/d828c9fba1b2/erd/5205</uri>\
         <json>{\"0x5205\":\"002d\"}</json></request></body></message>"
            .to_string(),
    )
    .await
    .unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceAdded { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceUpdated { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceStateChanged { .. }
    ));

    // A correlated request round-trips through the stanza format.
    let id = ApplianceId::new("d828c9fba1b2");
    let request = client.request_property_update(&id, None);
    let script = async {
        let stanza = timeout(TICK, far.recv()).await.unwrap().unwrap();
        assert!(stanza.contains("<method>GET</method>"));
        let corr = stanza
            .split("<id>")
            .nth(1)
            .and_then(|s| s.split("</id>").next())
            .unwrap()
            .to_string();
        far.send(format!(
            "<message from=\"d828c9fba1b2_user123@chat.example\" id=\"{corr}\">\
             <body><response><id>{corr}</id><method>GET</method>\
             <uri>/d828c9fba1b2/cache</uri>\
             <json>{{\"0008\":\"07\",\"5205\":\"002d\"}}</json></response></body></message>"
        ))
        .await
        .unwrap();
    };

    let (completion, ()) = tokio::join!(request, script);
    let completion = completion.unwrap();
    assert_eq!(completion.payload.len(), 2);
    // 5205 was already cached by the push; only the type code changed.
    assert_eq!(completion.changed.len(), 1);
    assert!(completion.changed.contains_key(&ErdCode(0x0008)));

    assert!(matches!(
        next_event(&mut events).await,
        Event::ApplianceClassified { .. }
    ));

    // Presence going away marks the appliance unavailable.
    far.send(
        "<presence from=\"d828c9fba1b2_user123@chat.example\" type=\"unavailable\"/>"
            .to_string(),
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!client.appliance(&id).unwrap().is_available());

    client.shutdown().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
