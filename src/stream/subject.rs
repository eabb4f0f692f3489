//! A hot push stream the host (or a test) emits into by hand.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Stream, StreamEvent, StreamSink, StreamSubscription};
use crate::value::Value;

#[derive(Default)]
struct SubjectState {
    sinks: Vec<(u64, StreamSink)>,
    next_id: u64,
    latest: Option<Value>,
    replay: bool,
    terminal: Option<StreamEvent>,
}

/// Multicast stream with optional replay of the latest value.
///
/// A plain subject only delivers values emitted after subscription. A
/// behavior subject also hands the latest value to every new subscriber
/// during `subscribe`, so it always "currently holds" a value.
///
/// # Examples
///
/// ```
/// use streambind::stream::Subject;
/// use streambind::Value;
///
/// let names = Subject::behavior(Value::from("Ann"));
/// names.next(Value::from("Bea"));
/// assert_eq!(names.value(), Some(Value::from("Bea")));
/// ```
#[derive(Default)]
pub struct Subject {
    state: Rc<RefCell<SubjectState>>,
}

impl Subject {
    /// Subject without replay.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Subject replaying the latest value, starting from `initial`.
    #[must_use]
    pub fn behavior(initial: Value) -> Rc<Self> {
        let subject = Self::default();
        {
            let mut state = subject.state.borrow_mut();
            state.replay = true;
            state.latest = Some(initial);
        }
        Rc::new(subject)
    }

    /// Emit a value to every current sink.
    pub fn next(&self, value: Value) {
        let sinks = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.latest = Some(value.clone());
            snapshot(&state)
        };
        let event = StreamEvent::Next(value);
        for sink in sinks {
            sink(&event);
        }
    }

    /// Fail the stream. Sinks are released afterwards.
    pub fn error(&self, message: impl Into<String>) {
        self.terminate(StreamEvent::Error(message.into()));
    }

    /// Complete the stream. Sinks are released afterwards.
    pub fn complete(&self) {
        self.terminate(StreamEvent::Complete);
    }

    fn terminate(&self, event: StreamEvent) {
        let sinks = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(event.clone());
            let sinks = snapshot(&state);
            state.sinks.clear();
            sinks
        };
        for sink in sinks {
            sink(&event);
        }
    }

    /// Latest emitted value, if any.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.state.borrow().latest.clone()
    }

    /// Number of active sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().sinks.len()
    }

    /// True after `error` or `complete`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().terminal.is_some()
    }
}

fn snapshot(state: &SubjectState) -> Vec<StreamSink> {
    state.sinks.iter().map(|(_, sink)| Rc::clone(sink)).collect()
}

impl Stream for Subject {
    fn subscribe(&self, sink: StreamSink) -> StreamSubscription {
        let (id, replay, terminal) = {
            let mut state = self.state.borrow_mut();
            let replay = if state.replay { state.latest.clone() } else { None };
            if let Some(terminal) = state.terminal.clone() {
                (None, replay, Some(terminal))
            } else {
                let id = state.next_id;
                state.next_id += 1;
                state.sinks.push((id, Rc::clone(&sink)));
                (Some(id), replay, None)
            }
        };

        if let Some(value) = replay {
            sink(&StreamEvent::Next(value));
        }
        if let Some(event) = terminal {
            sink(&event);
        }

        let Some(id) = id else {
            return StreamSubscription::closed();
        };
        let state = Rc::downgrade(&self.state);
        StreamSubscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().sinks.retain(|(sink_id, _)| *sink_id != id);
            }
        })
    }
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Subject")
            .field("subscribers", &state.sinks.len())
            .field("replay", &state.replay)
            .field("closed", &state.terminal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_sink() -> (StreamSink, Rc<RefCell<Vec<StreamEvent>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let sink: StreamSink = Rc::new(move |event: &StreamEvent| {
            sink_seen.borrow_mut().push(event.clone());
        });
        (sink, seen)
    }

    #[test]
    fn plain_subject_does_not_replay() {
        let subject = Subject::new();
        subject.next(Value::Int(1));
        let (sink, seen) = collecting_sink();
        let _subscription = subject.subscribe(sink);
        assert!(seen.borrow().is_empty());

        subject.next(Value::Int(2));
        assert_eq!(*seen.borrow(), vec![StreamEvent::Next(Value::Int(2))]);
    }

    #[test]
    fn behavior_subject_replays_latest() {
        let subject = Subject::behavior(Value::Int(1));
        subject.next(Value::Int(2));
        let (sink, seen) = collecting_sink();
        let _subscription = subject.subscribe(sink);
        assert_eq!(*seen.borrow(), vec![StreamEvent::Next(Value::Int(2))]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subject = Subject::new();
        let (sink, seen) = collecting_sink();
        let subscription = subject.subscribe(sink);
        assert_eq!(subject.subscriber_count(), 1);

        subscription.unsubscribe();
        assert_eq!(subject.subscriber_count(), 0);
        subject.next(Value::Int(1));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn complete_releases_sinks_and_ignores_later_values() {
        let subject = Subject::new();
        let (sink, seen) = collecting_sink();
        let _subscription = subject.subscribe(sink);

        subject.complete();
        subject.next(Value::Int(1));
        assert!(subject.is_closed());
        assert_eq!(subject.subscriber_count(), 0);
        assert_eq!(*seen.borrow(), vec![StreamEvent::Complete]);
    }

    #[test]
    fn late_subscriber_to_failed_subject_sees_error() {
        let subject = Subject::new();
        subject.error("boom");
        let (sink, seen) = collecting_sink();
        let subscription = subject.subscribe(sink);
        assert!(subscription.is_closed());
        assert_eq!(*seen.borrow(), vec![StreamEvent::Error("boom".to_string())]);
    }
}
