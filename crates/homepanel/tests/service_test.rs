//! End-to-end: a fake home service on axum, the real HTTP client and a
//! mounted dashboard polling it.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use homepanel::camera::CameraStatus;
use homepanel::device::FullState;
use homepanel::Config;
use homepanel::Dashboard;
use homepanel::Event;
use homepanel::HttpDeviceApi;
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Default)]
struct Service {
    state: FullState,
    /// When set, control requests are acknowledged but not applied
    ignore_commands: bool,
    /// When set, `full_state` answers 500
    broken: bool,
    /// When set, `full_state` never answers
    hang: bool,
    frame: Option<Vec<u8>>,
    requests: Vec<String>,
    state_requests: usize,
    tunnel_header: Option<String>,
}

type Shared = Arc<Mutex<Service>>;

#[derive(Deserialize)]
struct SetQuery {
    set: i64,
}

async fn full_state(State(svc): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let hang = {
        let mut svc = svc.lock().unwrap();
        svc.state_requests += 1;
        svc.tunnel_header = headers
            .get("ngrok-skip-browser-warning")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        svc.hang
    };
    if hang {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    let svc = svc.lock().unwrap();
    if svc.broken {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(svc.state.clone()).into_response()
}

fn control(svc: &Shared, name: &str, apply: impl FnOnce(&mut FullState)) -> StatusCode {
    let mut svc = svc.lock().unwrap();
    svc.requests.push(name.to_string());
    if !svc.ignore_commands {
        apply(&mut svc.state);
    }
    StatusCode::OK
}

async fn door(State(svc): State<Shared>, Query(q): Query<SetQuery>) -> StatusCode {
    control(&svc, &format!("door={}", q.set), |s| s.door_open = q.set)
}

async fn garage(State(svc): State<Shared>, Query(q): Query<SetQuery>) -> StatusCode {
    control(&svc, &format!("garage={}", q.set), |s| s.garage_open = q.set)
}

async fn ultrasonic(State(svc): State<Shared>, Query(q): Query<SetQuery>) -> StatusCode {
    control(&svc, &format!("ultrasonic={}", q.set), |s| {
        s.ultrasonic_active = q.set
    })
}

async fn leds(State(svc): State<Shared>, Path((index, value)): Path<(usize, u8)>) -> StatusCode {
    control(&svc, &format!("led{}={}", index, value), |s| {
        if let Some(slot) = s.led_intensities.get_mut(index) {
            *slot = i64::from(value);
        }
    })
}

async fn image(State(svc): State<Shared>) -> impl IntoResponse {
    match svc.lock().unwrap().frame.clone() {
        Some(data) => ([(axum::http::header::CONTENT_TYPE, "image/jpeg")], data).into_response(),
        None => (StatusCode::NOT_FOUND, "No image available").into_response(),
    }
}

async fn start_service(svc: Shared) -> String {
    let app = Router::new()
        .route("/api/full_state", get(full_state))
        .route("/control/door", get(door))
        .route("/control/garage", get(garage))
        .route("/control/ultrasonic", get(ultrasonic))
        .route("/control/leds/:index/:value", get(leds))
        .route("/get-image", get(image))
        .with_state(svc);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn config(base_url: String) -> Config {
    let mut config = Config::builtin();
    config.service.base_url = base_url;
    config.service.poll_interval_ms = 50;
    config.service.request_timeout_ms = 1000;
    config
        .service
        .headers
        .insert("ngrok-skip-browser-warning".to_string(), "true".to_string());
    config.camera.live_interval_ms = 20;
    config.camera.retry_interval_ms = 50;
    config.validate().unwrap();
    config
}

async fn mount(svc: &Shared) -> Dashboard {
    let config = config(start_service(svc.clone()).await);
    mount_with(config)
}

fn mount_with(config: Config) -> Dashboard {
    let client = HttpDeviceApi::new(&config.service, &config.camera).unwrap();
    Dashboard::mount(&config, Arc::new(client))
}

/// Poll `cond` until it holds or two seconds pass.
async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn initial_state() -> FullState {
    FullState {
        temp: Some(24.5),
        humedad: Some(55.0),
        distancia: Some(140.0),
        ultrasonic_active: 0,
        door_open: 0,
        garage_open: 1,
        led_intensities: vec![0, 80, 0, 0, 0, 0, 0, 0],
    }
}

#[tokio::test]
async fn test_mirrors_service_state() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;

    eventually(|| dashboard.state().online).await;
    let state = dashboard.state();
    assert_eq!(state.sensors.temperature, 24.5);
    assert_eq!(state.sensors.humidity, 55.0);
    assert!(state.garage_open);
    assert!(!state.door_open);
    let bathroom = state.room(2).unwrap();
    assert!(bathroom.is_on);
    assert_eq!(bathroom.brightness, 80);
    assert_eq!(svc.lock().unwrap().tunnel_header.as_deref(), Some("true"));

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_commands_reach_service() {
    // Room 1 starts lit so a poll racing the commands never shows it dark.
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: FullState {
            led_intensities: vec![50, 80, 0, 0, 0, 0, 0, 0],
            ..initial_state()
        },
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;
    eventually(|| dashboard.state().online).await;

    let dispatcher = dashboard.dispatcher();
    dispatcher.toggle_door(true).await.unwrap();
    dispatcher.toggle_alarm(true).await.unwrap();
    dispatcher.set_light(1, true).unwrap().await.unwrap();
    for value in [60.0, 40.0, 20.0] {
        dispatcher.change_brightness(1, value).unwrap();
    }
    dispatcher.commit_brightness(1, 12.0).unwrap().await.unwrap();

    assert_eq!(
        svc.lock().unwrap().requests,
        vec!["door=1", "ultrasonic=1", "led0=100", "led0=12"]
    );

    eventually(|| {
        let state = dashboard.state();
        state.door_open && state.alarm_enabled && state.room(1).unwrap().brightness == 12
    })
    .await;

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_ignored_command_reverts() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        ignore_commands: true,
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;
    eventually(|| dashboard.state().online).await;

    let handle = dashboard.dispatcher().toggle_door(true);
    assert!(dashboard.state().door_open);
    handle.await.unwrap();

    eventually(|| !dashboard.state().door_open).await;
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_outage_keeps_last_state() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;
    eventually(|| dashboard.state().online).await;
    let before = dashboard.state();

    {
        let mut svc = svc.lock().unwrap();
        svc.broken = true;
        svc.state.temp = Some(-40.0);
    }
    eventually(|| !dashboard.state().online).await;

    let after = dashboard.state();
    assert_eq!(after.sensors, before.sensors);
    assert_eq!(after.rooms, before.rooms);

    svc.lock().unwrap().broken = false;
    eventually(|| dashboard.state().sensors.temperature == -40.0).await;

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_intrusion_alert_and_camera() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        frame: Some(vec![0xff, 0xd8, 0xff, 0xe0]),
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;
    let mut events = dashboard.subscribe();
    eventually(|| dashboard.state().online).await;
    assert!(!dashboard.state().camera_active);

    {
        let mut svc = svc.lock().unwrap();
        svc.state.ultrasonic_active = 1;
        svc.state.distancia = Some(15.0);
    }

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, Event::IntrusionDetected { distance: 15.0 });

    eventually(|| dashboard.camera_feed().status == CameraStatus::Live).await;
    let frame = dashboard.camera_feed().frame.unwrap();
    assert_eq!(frame.content_type, "image/jpeg");
    assert_eq!(frame.data, vec![0xff, 0xd8, 0xff, 0xe0]);

    // Still in range for several ticks: no second alert.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut intrusions = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::IntrusionDetected { .. }) {
            intrusions += 1;
        }
    }
    assert_eq!(intrusions, 0);

    // Camera loses its feed.
    svc.lock().unwrap().frame = None;
    eventually(|| dashboard.camera_feed().status == CameraStatus::NoSignal).await;

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_hung_fetch_times_out() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        hang: true,
        ..Service::default()
    }));
    let mut config = config(start_service(svc.clone()).await);
    config.service.request_timeout_ms = 200;
    let dashboard = mount_with(config);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Each fetch gives up after 200ms and the next tick goes out anyway.
    let started = svc.lock().unwrap().state_requests;
    assert!(started >= 3, "only {} fetches started", started);
    assert!(!dashboard.state().online);

    svc.lock().unwrap().hang = false;
    eventually(|| dashboard.state().online).await;
    assert_eq!(dashboard.state().sensors.temperature, 24.5);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_null_reading_keeps_syncing() {
    let svc: Shared = Arc::new(Mutex::new(Service {
        state: initial_state(),
        ..Service::default()
    }));
    let dashboard = mount(&svc).await;
    eventually(|| dashboard.state().online).await;

    {
        let mut svc = svc.lock().unwrap();
        svc.state.temp = None;
        svc.state.door_open = 1;
        svc.state.led_intensities[0] = 300;
    }

    eventually(|| dashboard.state().door_open).await;
    let state = dashboard.state();
    assert_eq!(state.sensors.temperature, 24.5);
    assert_eq!(state.room(1).unwrap().brightness, 100);

    dashboard.unmount().await;
}
