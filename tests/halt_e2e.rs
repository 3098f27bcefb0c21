use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use salience::{
    Activation, AgendaEvaluator, AgendaGroup, ConsequenceExecutor, ExecutionContext, FireLimit,
    FireResult, GroupEvaluator, InMemorySession, RuleBaseConfig, Session, StopReason,
};

/// Session that pauses inside the first propagation flush until released.
struct GatedSession {
    inner: Arc<InMemorySession>,
    flushed_tx: Sender<()>,
    resume_rx: Receiver<()>,
}

impl Session for GatedSession {
    fn config(&self) -> Option<&RuleBaseConfig> {
        self.inner.config()
    }

    fn create_execution_context(&self) -> ExecutionContext {
        self.inner.create_execution_context()
    }

    fn refresh_queries_for(&self, activation: &Activation) -> FireResult<()> {
        self.inner.refresh_queries_for(activation)
    }

    fn flush_pending_effects(&self) -> FireResult<()> {
        self.inner.flush_pending_effects()?;
        if self.inner.flushes() == 1 {
            let _ = self.flushed_tx.send(());
            let _ = self.resume_rx.recv_timeout(Duration::from_secs(5));
        }
        Ok(())
    }
}

#[test]
fn halt_between_firings_from_another_thread_stops_after_one() {
    let inner = Arc::new(InMemorySession::new(RuleBaseConfig::default()));
    let group = inner.register_group("main").unwrap();
    let executor = Arc::new(ConsequenceExecutor::new(Arc::clone(&inner)));
    executor.register_fn("r", |_, _, _| Ok(())).unwrap();
    for _ in 0..4 {
        group.insert(Activation::new("r", "main", 0).unwrap()).unwrap();
    }

    let (flushed_tx, flushed_rx) = bounded::<()>(1);
    let (resume_tx, resume_rx) = bounded::<()>(1);
    let session = Arc::new(GatedSession {
        inner: Arc::clone(&inner),
        flushed_tx,
        resume_rx,
    });

    let mut evaluator = AgendaEvaluator::new(session, executor).unwrap();
    let handle = evaluator.halt_handle();

    let halter = thread::spawn(move || {
        flushed_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.halt();
        resume_tx.send(()).unwrap();
    });

    let outcome = evaluator
        .evaluate_and_fire_detailed(group.as_ref(), None, 0, FireLimit::Unlimited)
        .unwrap();
    halter.join().unwrap();

    assert_eq!(outcome.fired, 1);
    assert_eq!(outcome.stop, StopReason::Halted);
    assert_eq!(group.len().unwrap(), 3);
}

#[test]
fn halt_during_a_firing_lets_it_finish() {
    let session = Arc::new(InMemorySession::new(RuleBaseConfig::default()));
    let group = session.register_group("main").unwrap();
    let executor = Arc::new(ConsequenceExecutor::new(Arc::clone(&session)));

    let (halt_req_tx, halt_req_rx) = bounded::<()>(1);
    let (halted_tx, halted_rx) = bounded::<()>(1);
    executor
        .register_fn("slow", move |_, ctx, _| {
            halt_req_tx.send(()).unwrap();
            halted_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            ctx.set_local("finished", serde_json::json!(true));
            Ok(())
        })
        .unwrap();
    executor.register_fn("next", |_, _, _| Ok(())).unwrap();
    group.insert(Activation::new("slow", "main", 5).unwrap()).unwrap();
    group.insert(Activation::new("next", "main", 1).unwrap()).unwrap();

    let mut evaluator = AgendaEvaluator::new(session.clone(), executor.clone()).unwrap();
    let handle = evaluator.halt_handle();
    let halter = thread::spawn(move || {
        halt_req_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.halt();
        halted_tx.send(()).unwrap();
    });

    let fired = evaluator
        .evaluate_and_fire(group.as_ref(), None, 0, FireLimit::Unlimited)
        .unwrap();
    halter.join().unwrap();

    assert_eq!(fired, 1);
    assert_eq!(evaluator.context().local("finished"), Some(&serde_json::json!(true)));
    assert_eq!(group.len().unwrap(), 1);
    assert_eq!(session.flushes(), 1);
}

#[test]
fn halt_before_call_has_no_residual_effect() {
    let session = Arc::new(InMemorySession::new(RuleBaseConfig::sequential()));
    let group = session.register_group("main").unwrap();
    let executor = Arc::new(ConsequenceExecutor::new(Arc::clone(&session)));
    executor.register_fn("r", |_, _, _| Ok(())).unwrap();
    for _ in 0..3 {
        group.insert(Activation::new("r", "main", 0).unwrap()).unwrap();
    }

    let mut evaluator = AgendaEvaluator::new(session, executor).unwrap();
    let handle = evaluator.halt_handle();
    thread::spawn(move || handle.halt()).join().unwrap();
    evaluator.halt();

    let fired = evaluator
        .evaluate_and_fire(group.as_ref(), None, 0, FireLimit::Unlimited)
        .unwrap();
    assert_eq!(fired, 3);
    assert!(!evaluator.halt_handle().is_halted());
}
