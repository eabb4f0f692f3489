use std::alloc::System;
use std::rc::Rc;

use stats_alloc::{Region, StatsAlloc, INSTRUMENTED_SYSTEM};

use streambind::{Expr, StreamRebaser};

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

/// `Hello ${user.profile.name & debounce:delay}, you have ${cart.count} items`
fn unmarked_tree() -> Rc<Expr> {
    let member = Expr::member(Expr::member(Expr::scope("user"), "profile"), "name");
    let behavior = Expr::behavior(member, "debounce", vec![Expr::scope("delay")]);
    Expr::template(
        vec!["Hello ".into(), ", you have ".into(), " items".into()],
        vec![behavior, Expr::member(Expr::scope("cart"), "count")],
    )
}

// Counters are process-wide, so both budgets are measured from one test.
#[test]
fn rebase_allocation_budgets() {
    unmarked_rebase_allocation_budget(StreamRebaser::default());
    marked_rebase_allocation_budget(StreamRebaser::default());
}

fn unmarked_rebase_allocation_budget(rebaser: StreamRebaser) {
    let tree = unmarked_tree();

    // Warm up.
    let _ = rebaser.rebase(&tree).unwrap();

    let region = Region::new(GLOBAL);
    for _ in 0..1_000 {
        let rebased = rebaser.rebase(&tree).unwrap();
        assert!(Rc::ptr_eq(&rebased, &tree));
    }
    let stats = region.change();

    // Slack for the harness thread.
    assert!(
        stats.allocations <= 4,
        "unmarked rebase allocated: {stats:?}"
    );
}

fn marked_rebase_allocation_budget(rebaser: StreamRebaser) {
    // Only `cart$` is marked: the `cart$` access, its member and the template are rebuilt.
    let tree = Expr::template(
        vec!["Hello ".into(), ", you have ".into(), " items".into()],
        vec![
            Expr::member(Expr::member(Expr::scope("user"), "profile"), "name"),
            Expr::member(Expr::scope("cart$"), "count"),
        ],
    );

    let _ = rebaser.rebase(&tree).unwrap();

    let region = Region::new(GLOBAL);
    let rebased = rebaser.rebase(&tree).unwrap();
    let stats = region.change();
    assert!(rebased.is_stream_aware());

    // Budget is conservative: nodes, names, cooked strings and the child vector.
    assert!(
        stats.allocations <= 16,
        "marked rebase allocated too much: {stats:?}"
    );
}
