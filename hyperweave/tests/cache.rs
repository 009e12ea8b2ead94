//! The template cache seen through the engine.

use std::sync::Arc;
use std::thread;

use hyperweave::{Engine, Skeleton, values};
use hyperweave_testhelpers::setup;

#[test]
fn threads_share_one_compile() {
    setup();
    let engine = Arc::new(Engine::default());
    let skeleton = Skeleton::new(["<span>", "</span>"]);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let skeleton = skeleton.clone();
            thread::spawn(move || {
                let out = engine.render(&skeleton, values![i]).unwrap().ready().unwrap();
                assert_eq!(out, format!("<span>{i}</span>").as_str());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.cache().compile_count(), 1);
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn dropped_skeletons_can_be_purged() {
    setup();
    let engine = Engine::default();
    let kept = Skeleton::new(["<i>", "</i>"]);
    engine.render(&kept, values!["x"]).unwrap();

    for _ in 0..3 {
        let transient = Skeleton::new(["<b>", "</b>"]);
        engine.render(&transient, values!["y"]).unwrap();
    }
    assert_eq!(engine.cache().len(), 4);

    assert_eq!(engine.cache().purge(), 3);
    assert_eq!(engine.cache().len(), 1);

    // the surviving entry is still a hit
    engine.render(&kept, values!["z"]).unwrap();
    assert_eq!(engine.cache().compile_count(), 4);
}
