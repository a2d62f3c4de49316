use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use config::{
    ApplicationTrigger, ApplicationTriggerContext, Command, CommandMeta, ExecutionMode,
    KeyShortcut, KeyboardCommand, Modifier, Rule, ScriptCommand, ScriptSource, Trigger, Workflow,
    WorkflowGroup,
};
use keyflow_engine::{
    CommandRunner, Dispatcher, Engine, Error, EventDisposition, KeyEvent, Runners,
};
use parking_lot::Mutex;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Runner that records command names in execution order. Commands whose
/// name starts with "fail" report an error after recording the attempt
/// under a "!" prefix.
struct RecordingRunner {
    log: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &Command) -> keyflow_engine::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let name = command.name().to_string();
        if name.starts_with("fail") {
            self.log.lock().push(format!("!{}", name));
            return Err(Error::CommandFailed(name));
        }
        self.log.lock().push(name);
        Ok(())
    }
}

fn test_engine(delay_ms: u64) -> (Engine, Arc<Mutex<Vec<String>>>) {
    init_logging();
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = Arc::new(RecordingRunner {
        log: log.clone(),
        delay: Duration::from_millis(delay_ms),
    });
    (Engine::new(Arc::new(Runners::uniform(runner))), log)
}

fn shortcut(spec: &str) -> KeyShortcut {
    KeyShortcut::parse(spec).expect("valid shortcut spec")
}

fn script(name: &str) -> Command {
    Command::Script(ScriptCommand {
        meta: CommandMeta::named(name),
        source: ScriptSource::Inline(format!("echo {}", name)),
        shell: None,
    })
}

fn keyboard_workflow(name: &str, specs: &[&str], commands: Vec<Command>) -> Workflow {
    Workflow {
        name: name.into(),
        trigger: Some(Trigger::KeyboardShortcuts(
            specs.iter().map(|s| shortcut(s)).collect(),
        )),
        commands,
        ..Workflow::default()
    }
}

fn launched_workflow(name: &str, bundle: &str, commands: Vec<Command>) -> Workflow {
    Workflow {
        name: name.into(),
        trigger: Some(Trigger::Application(vec![ApplicationTrigger {
            bundle_identifier: bundle.into(),
            contexts: [ApplicationTriggerContext::Launched].into(),
        }])),
        commands,
        ..Workflow::default()
    }
}

fn global_group(workflows: Vec<Workflow>) -> WorkflowGroup {
    WorkflowGroup {
        workflows,
        ..WorkflowGroup::default()
    }
}

fn down(spec: &str) -> KeyEvent {
    KeyEvent::down(shortcut(spec))
}

fn up(spec: &str) -> KeyEvent {
    KeyEvent::up(shortcut(spec))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_chord_scenario() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w1",
        &["cmd+a", "cmd+b"],
        vec![script("c1")],
    )])]);

    // First key: consumed, chord in progress, nothing dispatched.
    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    settle().await;
    assert!(log.lock().is_empty());

    // Second key completes the chord.
    assert_eq!(
        engine.handle_key_event(&down("cmd+b")),
        EventDisposition::Consumed
    );
    // The key-up of the final key is swallowed too.
    assert_eq!(
        engine.handle_key_event(&up("cmd+b")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(*log.lock(), vec!["c1".to_string()]);

    // A lone unrelated key afterwards is released and dispatches nothing.
    assert_eq!(engine.handle_key_event(&down("x")), EventDisposition::Released);
    assert_eq!(engine.handle_key_event(&up("x")), EventDisposition::Released);
    settle().await;
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_on_failure_allows_fresh_match() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w1",
        &["cmd+a", "cmd+b"],
        vec![script("c1")],
    )])]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    // Wrong continuation: released, matcher resets.
    assert_eq!(
        engine.handle_key_event(&down("cmd+c")),
        EventDisposition::Released
    );
    // Fresh sequence still matches.
    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    assert_eq!(
        engine.handle_key_event(&down("cmd+b")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(*log.lock(), vec!["c1".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn scope_precedence_follows_frontmost_app() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[
        global_group(vec![keyboard_workflow("wild", &["cmd+k"], vec![script("wild")])]),
        WorkflowGroup {
            workflows: vec![keyboard_workflow("scoped", &["cmd+k"], vec![script("scoped")])],
            rule: Some(Rule {
                bundle_identifiers: vec!["com.x".into()],
                days: vec![],
            }),
            ..WorkflowGroup::default()
        },
    ]);

    engine.on_frontmost_application("com.x");
    assert_eq!(
        engine.handle_key_event(&down("cmd+k")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(*log.lock(), vec!["scoped".to_string()]);

    engine.on_frontmost_application("com.other");
    assert_eq!(
        engine.handle_key_event(&down("cmd+k")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(
        *log.lock(),
        vec!["scoped".to_string(), "wild".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatch_supersession_cancels_in_flight_serial_run() {
    // 100ms per command plus 100ms serial pacing: command timeline for run A
    // is roughly a1@100, a2@300, a3@500.
    let (engine, log) = test_engine(100);
    engine.set_groups(&[global_group(vec![
        {
            let mut w = keyboard_workflow(
                "a",
                &["cmd+1"],
                vec![script("a1"), script("a2"), script("a3")],
            );
            w.execution_mode = ExecutionMode::Serial;
            w
        },
        keyboard_workflow("b", &["cmd+2"], vec![script("b1")]),
    ])]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+1")),
        EventDisposition::Consumed
    );
    // Supersede mid-second-command.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        engine.handle_key_event(&down("cmd+2")),
        EventDisposition::Consumed
    );
    tokio::time::sleep(Duration::from_millis(500)).await;

    let log = log.lock();
    assert!(log.contains(&"a1".to_string()), "a1 ran: {:?}", *log);
    assert!(log.contains(&"a2".to_string()), "a2 completed: {:?}", *log);
    assert!(log.contains(&"b1".to_string()), "b1 ran: {:?}", *log);
    assert!(
        !log.contains(&"a3".to_string()),
        "superseded run must not reach a3: {:?}",
        *log
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_dispatches_leave_one_active_run() {
    init_logging();
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = Arc::new(RecordingRunner {
        log: log.clone(),
        delay: Duration::from_millis(10),
    });
    let dispatcher = Dispatcher::new(Arc::new(Runners::uniform(runner)));

    // Key events and application observations arrive on different host
    // threads; racing dispatches must still cancel the losing run.
    for round in 0..20 {
        log.lock().clear();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let threads: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|tag| {
                let dispatcher = dispatcher.clone();
                let barrier = barrier.clone();
                let commands = vec![script(&format!("{}1", tag)), script(&format!("{}2", tag))];
                std::thread::spawn(move || {
                    barrier.wait();
                    dispatcher.run(commands, ExecutionMode::Concurrent);
                })
            })
            .collect();
        for thread in threads {
            thread.join().expect("dispatch thread");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let log = log.lock();
        let completed = ["a2", "b2"]
            .iter()
            .filter(|name| log.contains(&name.to_string()))
            .count();
        assert!(
            completed <= 1,
            "round {}: both runs survived supersession: {:?}",
            round,
            *log
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_command_does_not_halt_the_run() {
    let (engine, log) = test_engine(0);
    for (mode, trigger) in [
        (ExecutionMode::Serial, "cmd+1"),
        (ExecutionMode::Concurrent, "cmd+2"),
    ] {
        let mut w = keyboard_workflow(
            "w",
            &[trigger],
            vec![script("fail-first"), script("ok-second")],
        );
        w.execution_mode = mode;
        engine.set_groups(&[global_group(vec![w])]);
        log.lock().clear();

        assert_eq!(
            engine.handle_key_event(&down(trigger)),
            EventDisposition::Consumed
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *log.lock(),
            vec!["!fail-first".to_string(), "ok-second".to_string()],
            "mode {:?}",
            mode
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_commands_are_filtered_in_order() {
    let (engine, log) = test_engine(0);
    let mut disabled = script("skipped");
    if let Command::Script(s) = &mut disabled {
        s.meta.is_enabled = false;
    }
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w",
        &["cmd+1"],
        vec![script("first"), disabled, script("third")],
    )])]);

    engine.handle_key_event(&down("cmd+1"));
    settle().await;
    assert_eq!(
        *log.lock(),
        vec!["first".to_string(), "third".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_launch_dispatches_exactly_once() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[global_group(vec![launched_workflow(
        "w2",
        "com.foo",
        vec![script("on-launch")],
    )])]);

    engine.on_running_applications(vec![]);
    engine.on_running_applications(vec!["com.foo".into()]);
    settle().await;
    assert_eq!(*log.lock(), vec!["on-launch".to_string()]);

    // Still running: no further dispatch.
    engine.on_running_applications(vec!["com.foo".into()]);
    settle().await;
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_close_and_no_event_for_survivors() {
    let (engine, log) = test_engine(0);
    let closed = Workflow {
        name: "on-a-close".into(),
        trigger: Some(Trigger::Application(vec![ApplicationTrigger {
            bundle_identifier: "A".into(),
            contexts: [ApplicationTriggerContext::Closed].into(),
        }])),
        commands: vec![script("a-closed")],
        ..Workflow::default()
    };
    let survivor = launched_workflow("on-b-launch", "B", vec![script("b-launched")]);
    engine.set_groups(&[global_group(vec![closed, survivor])]);

    engine.on_running_applications(vec!["A".into(), "B".into()]);
    settle().await;
    // B launching was already reported by the first observation.
    assert_eq!(*log.lock(), vec!["b-launched".to_string()]);

    engine.on_running_applications(vec!["B".into(), "C".into()]);
    settle().await;
    // Exactly one closed(A); nothing fires for B.
    assert_eq!(
        *log.lock(),
        vec!["b-launched".to_string(), "a-closed".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn frontmost_change_dispatches_registered_workflows() {
    let (engine, log) = test_engine(0);
    let front = Workflow {
        name: "on-front".into(),
        trigger: Some(Trigger::Application(vec![ApplicationTrigger {
            bundle_identifier: "com.bar".into(),
            contexts: [ApplicationTriggerContext::FrontMost].into(),
        }])),
        commands: vec![script("fronted")],
        ..Workflow::default()
    };
    engine.set_groups(&[global_group(vec![front])]);

    engine.on_frontmost_application("com.bar");
    settle().await;
    assert_eq!(*log.lock(), vec!["fronted".to_string()]);
    assert_eq!(engine.frontmost_application().as_deref(), Some("com.bar"));

    engine.on_frontmost_application("com.other");
    settle().await;
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn notification_command_publishes_last_executed() {
    let (engine, log) = test_engine(0);
    let mut notifying = script("seen");
    if let Command::Script(s) = &mut notifying {
        s.meta.notification = true;
    }
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w",
        &["cmd+1"],
        vec![script("quiet"), notifying],
    )])]);
    let mut rx = engine.last_executed();
    assert!(rx.borrow().is_none());

    engine.handle_key_event(&down("cmd+1"));
    settle().await;
    assert_eq!(*log.lock(), vec!["quiet".to_string(), "seen".to_string()]);
    // Only the notifying command is published.
    assert_eq!(
        rx.borrow_and_update().as_ref().map(|c| c.name().to_string()),
        Some("seen".to_string())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn key_up_forwards_to_trailing_keyboard_command() {
    struct RemapRunner {
        log: Arc<Mutex<Vec<String>>>,
    }
    #[async_trait]
    impl CommandRunner for RemapRunner {
        async fn run(&self, command: &Command) -> keyflow_engine::Result<()> {
            self.log.lock().push(command.name().to_string());
            Ok(())
        }
        async fn forward_key_up(
            &self,
            command: &Command,
            shortcut: &KeyShortcut,
        ) -> keyflow_engine::Result<()> {
            self.log.lock().push(format!("{}-up:{}", command.name(), shortcut));
            Ok(())
        }
    }

    init_logging();
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::new(Arc::new(Runners::uniform(Arc::new(RemapRunner {
        log: log.clone(),
    }))));
    let remap = Command::Keyboard(KeyboardCommand {
        meta: CommandMeta::named("remap"),
        key_shortcuts: vec![KeyShortcut::new("b", [Modifier::Command])],
    });
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w",
        &["cmd+a"],
        vec![remap],
    )])]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    settle().await;
    // The key-up is consumed and relayed through the forward entry point,
    // so the runner sees the key-up distinctly from the initial replay.
    assert_eq!(
        engine.handle_key_event(&up("cmd+a")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(
        *log.lock(),
        vec!["remap".to_string(), "remap-up:cmd+a".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn repeat_downs_never_advance_or_redispatch() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w",
        &["cmd+a"],
        vec![script("c1")],
    )])]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    settle().await;
    // OS auto-repeat of the matched key stays suppressed without firing again.
    let mut repeat = down("cmd+a");
    repeat.repeat = true;
    assert_eq!(
        engine.handle_key_event(&repeat),
        EventDisposition::Consumed
    );
    // Repeats of unrelated keys pass through.
    let mut other = down("x");
    other.repeat = true;
    assert_eq!(engine.handle_key_event(&other), EventDisposition::Released);
    settle().await;
    assert_eq!(*log.lock(), vec!["c1".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeat_of_held_key_stays_suppressed_mid_chord() {
    let (engine, log) = test_engine(0);
    engine.set_groups(&[global_group(vec![keyboard_workflow(
        "w",
        &["cmd+a", "cmd+b"],
        vec![script("c1")],
    )])]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    // Holding the accepted key mid-chord must not leak repeats to the app.
    let mut held = down("cmd+a");
    held.repeat = true;
    assert_eq!(engine.handle_key_event(&held), EventDisposition::Consumed);
    // Repeats of other keys still pass through and leave progress intact.
    let mut other = down("x");
    other.repeat = true;
    assert_eq!(engine.handle_key_event(&other), EventDisposition::Released);
    assert_eq!(
        engine.handle_key_event(&down("cmd+b")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(*log.lock(), vec!["c1".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn ron_fixture_group_matches_end_to_end() {
    let (engine, log) = test_engine(0);
    let group: WorkflowGroup = ron::from_str(
        r#"(
            name: "Fixtures",
            workflows: [(
                name: "Hello",
                trigger: Some(keyboard_shortcuts([
                    (key: "h", modifiers: [command]),
                    (key: "i", modifiers: [command]),
                ])),
                commands: [script((
                    meta: (name: "hello"),
                    source: inline("echo hello"),
                ))],
            )],
        )"#,
    )
    .expect("valid fixture");
    engine.set_groups(&[group]);

    assert_eq!(
        engine.handle_key_event(&down("cmd+h")),
        EventDisposition::Consumed
    );
    assert_eq!(
        engine.handle_key_event(&down("cmd+i")),
        EventDisposition::Consumed
    );
    settle().await;
    assert_eq!(*log.lock(), vec!["hello".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn index_rebuild_resets_chord_in_progress() {
    let (engine, log) = test_engine(0);
    let groups = [global_group(vec![keyboard_workflow(
        "w",
        &["cmd+a", "cmd+b"],
        vec![script("c1")],
    )])];
    engine.set_groups(&groups);

    assert_eq!(
        engine.handle_key_event(&down("cmd+a")),
        EventDisposition::Consumed
    );
    // Rebuild mid-chord: progress is discarded.
    engine.set_groups(&groups);
    assert_eq!(
        engine.handle_key_event(&down("cmd+b")),
        EventDisposition::Released
    );
    settle().await;
    assert!(log.lock().is_empty());
}
