//! Integration Tests for the Reactive Pipeline
//!
//! These tests verify that the store, the scheduler and the template cache
//! work together: writes coalesce into one flush per turn, and render effects
//! swap freshly cloned elements into a mount without re-parsing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::html;
use ripple_core::reactive::{create_state, FlushPhase, MicrotaskQueue, TokioDefer};
use ripple_core::template::{
    create_renderer, CallSite, Fragment, Html5everParser, MarkupParser, Mount, TemplateCache,
};

/// The sum scenario: effects see stale values until the turn ends.
#[test]
fn sum_tracks_foo_and_bar() {
    let queue = MicrotaskQueue::new();
    let (state, effects) = create_state::<i32>(queue.clone());

    state.set("foo", 1);
    state.set("bar", 2);

    let sum = state.clone();
    effects.use_effect(move || {
        let total = sum.get("foo").unwrap_or(0) + sum.get("bar").unwrap_or(0);
        sum.set("sum", total);
    });

    // Registration runs the effect right away
    assert_eq!(state.get_untracked("sum"), Some(3));

    state.set("foo", 2);
    assert_eq!(state.get_untracked("sum"), Some(3));
    queue.run_until_idle();
    assert_eq!(state.get_untracked("sum"), Some(4));

    state.set("bar", 3);
    queue.run_until_idle();
    assert_eq!(state.get_untracked("sum"), Some(5));

    state.set("foo", 4);
    state.set("bar", 4);
    assert_eq!(state.get_untracked("sum"), Some(5));
    queue.run_until_idle();
    assert_eq!(state.get_untracked("sum"), Some(8));
}

/// Effects only ever observe the last value written in a turn, once per
/// write that queued them.
#[test]
fn effects_observe_final_values_of_a_turn() {
    let queue = MicrotaskQueue::new();
    let (state, effects) = create_state::<i32>(queue.clone());
    state.set("a", 0);
    state.set("b", 0);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let reader = state.clone();
    effects.use_effect(move || {
        let a = reader.get("a").unwrap_or(0);
        let b = reader.get("b").unwrap_or(0);
        seen_clone.borrow_mut().push((a, b));
    });

    queue.turn(|| {
        state.set("a", 10);
        state.set("a", 20);
        state.set("b", 30);
        state.set("a", 40);
    });

    assert_eq!(
        *seen.borrow(),
        vec![(0, 0), (40, 30), (40, 30), (40, 30), (40, 30)]
    );
}

/// A chain of effects settles within a single flush.
#[test]
fn chained_effects_settle_in_one_flush() {
    let queue = MicrotaskQueue::new();
    let (state, effects) = create_state::<i32>(queue.clone());
    state.set("celsius", 0);

    let to_f = state.clone();
    effects.use_effect(move || {
        let c = to_f.get("celsius").unwrap_or(0);
        to_f.set("fahrenheit", c * 9 / 5 + 32);
    });

    let label = state.clone();
    let labels = Rc::new(RefCell::new(Vec::new()));
    let labels_clone = labels.clone();
    effects.use_effect(move || {
        labels_clone
            .borrow_mut()
            .push(label.get("fahrenheit").unwrap_or_default());
    });

    queue.run_until_idle();
    labels.borrow_mut().clear();

    state.set("celsius", 100);
    assert_eq!(queue.run_until_idle(), 1);

    assert_eq!(*labels.borrow(), vec![212]);
    assert_eq!(effects.phase(), FlushPhase::Idle);
}

/// Counts calls into the real parser.
struct CountingParser {
    calls: Rc<Cell<usize>>,
}

impl MarkupParser for CountingParser {
    fn parse_fragment(&self, markup: &str) -> Fragment {
        self.calls.set(self.calls.get() + 1);
        Html5everParser.parse_fragment(markup)
    }
}

static CARD: CallSite = CallSite::new(&[
    "<div class=\"card ",
    "\" data-count=\"",
    "\"><h2>",
    "</h2><p>Clicked ",
    " times</p></div>",
]);

/// A render effect re-renders on writes, parsing the template only once.
#[test]
fn render_effect_updates_mount() {
    let calls = Rc::new(Cell::new(0));
    let cache = Rc::new(TemplateCache::with_parser(CountingParser {
        calls: calls.clone(),
    }));
    let renderer = create_renderer(cache.clone(), &CARD);
    let mount = Mount::new();

    let queue = MicrotaskQueue::new();
    let (state, effects) = create_state::<String>(queue.clone());
    state.set("theme", "light".to_string());
    state.set("title", "Counter".to_string());
    state.set("count", "0".to_string());

    let (reader, target) = (state.clone(), mount.clone());
    effects.use_effect(move || {
        let theme = reader.get("theme").unwrap_or_default();
        let title = reader.get("title").unwrap_or_default();
        let count = reader.get("count").unwrap_or_default();

        let element = renderer
            .render(&[&theme, &count, &title, &count])
            .expect("card renders");
        target.swap(element);
    });

    assert_eq!(
        mount.to_html(),
        "<div class=\"card light\" data-count=\"0\"><h2>Counter</h2><p>Clicked 0 times</p></div>"
    );

    for n in 1..=3 {
        queue.turn(|| state.set("count", n.to_string()));
    }
    queue.turn(|| {
        state.set("theme", "dark".to_string());
        state.set("title", "Clicks".to_string());
    });

    assert_eq!(
        mount.to_html(),
        "<div class=\"card dark\" data-count=\"3\"><h2>Clicks</h2><p>Clicked 3 times</p></div>"
    );
    // The last turn wrote two keys, so the card rendered twice
    assert_eq!(mount.swap_count(), 6);
    assert_eq!(calls.get(), 1);
    assert_eq!(cache.compile_count(), 1);
}

/// Values containing markup are rendered as text.
#[test]
fn interpolated_markup_is_escaped() {
    let cache = TemplateCache::new();
    let element = html!(cache, ["<p title=\"", "\">", "</p>"], "\"quoted\"", "<script>").unwrap();

    assert_eq!(element.attribute("title"), Some("\"quoted\""));
    assert_eq!(element.text_content(), "<script>");
    assert_eq!(
        element.to_html(),
        "<p title=\"&quot;quoted&quot;\">&lt;script&gt;</p>"
    );
}

/// The tokio host flushes once the writing task yields.
#[tokio::test(flavor = "current_thread")]
async fn tokio_host_flushes_after_yield() {
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async {
            let (state, effects) = create_state::<i32>(TokioDefer);
            state.set("n", 1);

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let reader = state.clone();
            effects.use_effect(move || {
                let _ = tx.send(reader.get("n").unwrap_or(0));
            });

            assert_eq!(rx.recv().await, Some(1));

            state.set("n", 2);
            state.set("n", 3);
            assert_eq!(effects.phase(), FlushPhase::Armed);

            // One run per write, both after the turn
            assert_eq!(rx.recv().await, Some(3));
            assert_eq!(rx.recv().await, Some(3));
            assert_eq!(effects.phase(), FlushPhase::Idle);
            assert!(rx.try_recv().is_err());
        })
        .await;
}
