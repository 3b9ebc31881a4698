//! The state container contract and an in-memory container.
//!
//! The engine only needs three things from a host container: a synchronous
//! read of the latest state, a synchronous dispatch that runs every side
//! effect before returning, and a subscription that fires after each accepted
//! dispatch. [`StateContainer`] captures exactly that.
//!
//! [`MemoryContainer`] is a single-threaded, serial-dispatch container. Its
//! [`enhance`](MemoryContainer::enhance) constructor composes the host
//! application's reducer with the engine's reducer, nesting the engine's
//! sub-tree under the reserved `"@@scoop"` key.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::action::EngineAction;
use crate::reducer::reduce;
use crate::state::EngineState;

/// What the engine requires from a host state container.
///
/// Implementations dispatch serially: one action, including every subscriber
/// callback it triggers, completes before the next is accepted.
pub trait StateContainer {
    /// The engine's sub-tree of the latest state.
    fn engine_state(&self) -> Rc<EngineState>;

    /// Dispatch an engine action. Returns after the new state is committed
    /// and all subscribers have been called.
    fn dispatch_engine(&self, action: EngineAction);

    /// Register a callback to run after each accepted dispatch.
    fn subscribe(&self, listener: Rc<dyn Fn()>);
}

/// Any action accepted by a [`MemoryContainer`]: one of the engine's own, or
/// one of the host application's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action<A> {
    Engine(EngineAction),
    Host(A),
}

impl<A> From<EngineAction> for Action<A> {
    fn from(action: EngineAction) -> Self {
        Action::Engine(action)
    }
}

/// Full container state: the host's own state plus the engine sub-tree.
///
/// Serializes as the host state's fields with the engine sub-tree added
/// under `"@@scoop"`.
pub struct RootState<S> {
    host: Rc<S>,
    engine: Rc<EngineState>,
}

impl<S> RootState<S> {
    /// The host application's state.
    pub fn host(&self) -> &S {
        &self.host
    }

    /// The engine's normalized sub-tree.
    pub fn engine(&self) -> &EngineState {
        &self.engine
    }
}

impl<S: fmt::Debug> fmt::Debug for RootState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootState")
            .field("host", &self.host)
            .field("engine", &self.engine)
            .finish()
    }
}

#[derive(Serialize)]
struct RootStateRepr<'a, S> {
    #[serde(flatten)]
    host: &'a S,
    #[serde(rename = "@@scoop")]
    engine: &'a EngineState,
}

impl<S: Serialize> Serialize for RootState<S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        RootStateRepr {
            host: self.host.as_ref(),
            engine: self.engine.as_ref(),
        }
        .serialize(serializer)
    }
}

type HostReducer<S, A> = Box<dyn Fn(&S, &A) -> S>;

/// Single-threaded in-memory container with serial, synchronous dispatch.
pub struct MemoryContainer<S, A> {
    state: RefCell<Rc<RootState<S>>>,
    host_reducer: HostReducer<S, A>,
    listeners: RefCell<Vec<Rc<dyn Fn()>>>,
    observers: RefCell<Vec<Rc<dyn Fn(&Action<A>)>>>,
}

impl<S: 'static, A: 'static> MemoryContainer<S, A> {
    /// Compose `host_reducer` with the engine's reducer.
    ///
    /// Host actions go to `host_reducer`; engine actions go to the engine
    /// reducer under the reserved key. Each side leaves the other untouched.
    pub fn enhance(host_reducer: impl Fn(&S, &A) -> S + 'static, preloaded: S) -> Rc<Self> {
        Self::with_engine_state(host_reducer, preloaded, EngineState::new())
    }

    /// Like [`enhance`](Self::enhance), but also preloads the engine sub-tree.
    pub fn with_engine_state(
        host_reducer: impl Fn(&S, &A) -> S + 'static,
        preloaded: S,
        engine: EngineState,
    ) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(Rc::new(RootState {
                host: Rc::new(preloaded),
                engine: Rc::new(engine),
            })),
            host_reducer: Box::new(host_reducer),
            listeners: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
        })
    }

    /// The latest committed state.
    pub fn state(&self) -> Rc<RootState<S>> {
        Rc::clone(&self.state.borrow())
    }

    /// Reduce `action`, commit the result, then notify action observers and
    /// subscribers in registration order.
    ///
    /// Subscribers may dispatch again; the nested dispatch completes before
    /// the remaining subscribers of the outer one run.
    pub fn dispatch(&self, action: Action<A>) {
        let next = {
            let current = self.state.borrow();
            match &action {
                Action::Engine(engine_action) => {
                    debug!(
                        kind = engine_action.kind(),
                        entity = %engine_action.target(),
                        fields = engine_action.data().len(),
                        "engine action"
                    );
                    RootState {
                        host: Rc::clone(&current.host),
                        engine: Rc::new(reduce(&current.engine, engine_action)),
                    }
                }
                Action::Host(host_action) => RootState {
                    host: Rc::new((self.host_reducer)(&current.host, host_action)),
                    engine: Rc::clone(&current.engine),
                },
            }
        };
        *self.state.borrow_mut() = Rc::new(next);

        let observers: Vec<_> = self.observers.borrow().iter().cloned().collect();
        for observer in observers {
            observer(&action);
        }
        let listeners: Vec<_> = self.listeners.borrow().iter().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    /// Register an observer that sees every dispatched action after it has
    /// been reduced.
    pub fn observe_actions(&self, observer: impl Fn(&Action<A>) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl MemoryContainer<(), ()> {
    /// A container with no host state of its own.
    pub fn engine_only() -> Rc<Self> {
        Self::enhance(|_, _| (), ())
    }
}

impl<S: 'static, A: 'static> StateContainer for MemoryContainer<S, A> {
    fn engine_state(&self) -> Rc<EngineState> {
        Rc::clone(&self.state.borrow().engine)
    }

    fn dispatch_engine(&self, action: EngineAction) {
        self.dispatch(Action::Engine(action));
    }

    fn subscribe(&self, listener: Rc<dyn Fn()>) {
        self.listeners.borrow_mut().push(listener);
    }
}

impl<S, A> fmt::Debug for MemoryContainer<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContainer")
            .field("subscribers", &self.listeners.borrow().len())
            .field("entities", &self.state.borrow().engine.entity_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use scoop_types::{FieldMap, Ref, StoredValue};
    use serde_json::json;

    #[derive(Debug, Serialize)]
    struct Counter {
        count: i64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    enum CounterAction {
        Increment,
    }

    fn counter_container() -> Rc<MemoryContainer<Counter, CounterAction>> {
        MemoryContainer::enhance(
            |state: &Counter, action: &CounterAction| match action {
                CounterAction::Increment => Counter {
                    count: state.count + 1,
                },
            },
            Counter { count: 0 },
        )
    }

    fn create_todo(id: i64) -> EngineAction {
        EngineAction::Create {
            target: Ref::new("Todo", Some(id.into())),
            data: FieldMap::from([("done".to_string(), StoredValue::Bool(false))]),
        }
    }

    #[test]
    fn host_and_engine_reducers_stay_separate() {
        let container = counter_container();
        container.dispatch(Action::Host(CounterAction::Increment));
        container.dispatch_engine(create_todo(1));

        let state = container.state();
        assert_eq!(state.host().count, 1);
        assert!(state.engine().contains(&Ref::new("Todo", Some(1.into()))));
    }

    #[test]
    fn subscribers_run_after_commit() {
        let container = counter_container();
        let seen = Rc::new(Cell::new(0));

        let observed = Rc::clone(&seen);
        let weak = Rc::downgrade(&container);
        container.subscribe(Rc::new(move || {
            let c = weak.upgrade().unwrap();
            observed.set(c.state().host().count);
        }));

        container.dispatch(Action::Host(CounterAction::Increment));
        assert_eq!(seen.get(), 1);
        assert_eq!(container.subscriber_count(), 1);
    }

    #[test]
    fn subscribers_may_dispatch() {
        let container = MemoryContainer::engine_only();
        let weak = Rc::downgrade(&container);
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        container.subscribe(Rc::new(move || {
            if !flag.replace(true) {
                weak.upgrade().unwrap().dispatch_engine(create_todo(2));
            }
        }));

        container.dispatch_engine(create_todo(1));
        assert_eq!(container.engine_state().entity_count(), 2);
    }

    #[test]
    fn observers_see_every_action() {
        let container = counter_container();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        container.observe_actions(move |a| sink.borrow_mut().push(a.clone()));

        container.dispatch(Action::Host(CounterAction::Increment));
        container.dispatch_engine(create_todo(1));

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], Action::Host(CounterAction::Increment));
        assert_eq!(log[1], Action::Engine(create_todo(1)));
    }

    #[test]
    fn root_state_nests_engine_under_reserved_key() {
        let container = counter_container();
        container.dispatch_engine(create_todo(1));

        let json = serde_json::to_value(&*container.state()).unwrap();
        assert_eq!(
            json,
            json!({
                "count": 0,
                "@@scoop": {
                    "Todo": {"@@scoop": "instances", "1": {"done": false}}
                }
            })
        );
    }

    #[test]
    fn engine_actions_parse_before_host_actions() {
        let parsed: Action<CounterAction> = serde_json::from_value(json!({
            "type": "@@scoop/CREATE",
            "ref": {"@@scoop": "ref", "type": "Todo", "id": 1},
            "data": {"done": false}
        }))
        .unwrap();
        assert_eq!(parsed, Action::Engine(create_todo(1)));

        let host: Action<CounterAction> =
            serde_json::from_value(json!({"type": "Increment"})).unwrap();
        assert_eq!(host, Action::Host(CounterAction::Increment));
    }
}
