use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use roverlink::camera::CameraEvent;
use roverlink::motion::MotionEvent;
use roverlink::{
    CameraAxis, Config, ConsoleUpdate, Direction, Link, LinkEvent, run_control_loop,
};

const PERIOD: Duration = Duration::from_millis(50);
/// Generous scheduling slack for loaded CI machines.
const JITTER: Duration = Duration::from_millis(60);

struct Console {
    events: Sender<LinkEvent>,
    updates: Receiver<ConsoleUpdate>,
    control: Option<JoinHandle<()>>,
}

impl Console {
    fn start() -> Self {
        let config = Config {
            heartbeat_ms: PERIOD.as_millis() as u64,
            ..Config::default()
        };
        let (events_tx, events_rx) = mpsc::channel();
        let (updates_tx, updates_rx) = mpsc::channel();
        let link = Link::new(&config, events_tx.clone(), updates_tx);
        let running = Arc::new(AtomicBool::new(true));
        let control = thread::spawn(move || run_control_loop(link, events_rx, running));
        Self {
            events: events_tx,
            updates: updates_rx,
            control: Some(control),
        }
    }

    fn send(&self, event: LinkEvent) {
        self.events.send(event).unwrap();
    }

    fn wait_for(&self, wanted: &ConsoleUpdate) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(update) = self.updates.recv_timeout(Duration::from_millis(50)) {
                if &update == wanted {
                    return;
                }
            }
        }
        panic!("never saw {wanted:?}");
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        let _ = self.events.send(LinkEvent::Shutdown);
        if let Some(control) = self.control.take() {
            let _ = control.join();
        }
    }
}

/// Fake robot end of the control channel.
struct Robot {
    lines: BufReader<TcpStream>,
}

impl Robot {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        Self {
            lines: BufReader::new(stream),
        }
    }

    /// Next line and when it arrived. `None` on EOF.
    fn next(&mut self) -> Option<(String, Instant)> {
        let mut line = String::new();
        match self.lines.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some((line, Instant::now())),
            Err(e) => panic!("robot read failed: {e}"),
        }
    }

    fn expect(&mut self, wanted: &str) -> Instant {
        let (line, at) = self.next().expect("channel closed");
        assert_eq!(line, wanted);
        at
    }
}

fn connect(console: &Console) -> (TcpListener, Robot) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    console.send(LinkEvent::ToggleConnect {
        host: "127.0.0.1".into(),
        port,
    });
    let robot = Robot::accept(&listener);
    console.wait_for(&ConsoleUpdate::Status("Connected".into()));
    (listener, robot)
}

#[test]
fn drive_forward_and_stop_over_tcp() {
    let console = Console::start();
    let (_listener, mut robot) = connect(&console);

    console.send(LinkEvent::Motion(MotionEvent::KeyDown(Direction::Forward)));
    // Heartbeats may already be flowing; skip STOPs sent before the press.
    let mut last = loop {
        let (line, at) = robot.next().expect("channel closed");
        if line != "STOP\n" {
            assert_eq!(line, "WHEELS 0.50 0.50\n");
            break at;
        }
    };

    for _ in 0..5 {
        let at = robot.expect("WHEELS 0.50 0.50\n");
        assert!(at - last <= PERIOD + JITTER, "gap {:?}", at - last);
        last = at;
    }

    console.send(LinkEvent::Motion(MotionEvent::KeyUp(Direction::Forward)));
    let mut saw_stop = false;
    for _ in 0..10 {
        let (line, at) = robot.next().expect("channel closed");
        assert!(at - last <= PERIOD + JITTER, "gap {:?}", at - last);
        last = at;
        if saw_stop {
            assert_eq!(line, "STOP\n");
        } else if line == "STOP\n" {
            saw_stop = true;
        } else {
            assert_eq!(line, "WHEELS 0.50 0.50\n");
        }
    }
    assert!(saw_stop);
}

#[test]
fn camera_change_is_sent_once() {
    let console = Console::start();
    let (_listener, mut robot) = connect(&console);

    console.send(LinkEvent::Camera(CameraEvent::SliderChanged(
        CameraAxis::Tilt,
        10,
    )));
    let mut cams = Vec::new();
    for _ in 0..10 {
        let (line, _) = robot.next().expect("channel closed");
        if line.starts_with("CAM") {
            cams.push(line);
        } else {
            assert_eq!(line, "STOP\n");
        }
    }
    assert_eq!(cams, ["CAM 90 15\n"]);
}

#[test]
fn disconnect_silences_the_channel() {
    let console = Console::start();
    let (_listener, mut robot) = connect(&console);
    robot.expect("STOP\n");

    console.send(LinkEvent::Disconnect);
    console.wait_for(&ConsoleUpdate::NoSignal);

    // Anything already in flight may still drain, then EOF.
    let mut trailing = 0;
    while let Some((line, _)) = robot.next() {
        assert_eq!(line, "STOP\n");
        trailing += 1;
        assert!(trailing < 3, "heartbeat kept running after disconnect");
    }

    // Input while disconnected goes nowhere and does not fail.
    console.send(LinkEvent::Motion(MotionEvent::KeyDown(Direction::Left)));
    console.send(LinkEvent::AutoMode(true));
}

#[test]
fn robot_hangup_is_reported() {
    let console = Console::start();
    let (_listener, robot) = connect(&console);
    drop(robot);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut saw_blank = false;
    let mut saw_status = false;
    while Instant::now() < deadline && !(saw_blank && saw_status) {
        match console.updates.recv_timeout(Duration::from_millis(50)) {
            Ok(ConsoleUpdate::NoSignal) => saw_blank = true,
            Ok(ConsoleUpdate::Status(text)) => {
                saw_status |= text == "Disconnected" || text.starts_with("Error: ")
            }
            Err(_) => {}
        }
    }
    assert!(saw_blank && saw_status);
}

#[test]
fn refused_connect_reports_error_and_can_retry() {
    let console = Console::start();
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    console.send(LinkEvent::ToggleConnect {
        host: "127.0.0.1".into(),
        port,
    });
    console.wait_for(&ConsoleUpdate::Status("Error: connection refused".into()));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    console.send(LinkEvent::ToggleConnect {
        host: "127.0.0.1".into(),
        port,
    });
    let mut robot = Robot::accept(&listener);
    console.wait_for(&ConsoleUpdate::Status("Connected".into()));
    robot.expect("STOP\n");
}
