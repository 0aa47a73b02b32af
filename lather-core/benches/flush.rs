use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lather_core::views::ProgressBarProps;
use lather_core::{Config, Host, ProgressBar, Timer};

fn coalesced_writes(c: &mut Criterion) {
    let host = Host::new(Config::default());
    let bar = host
        .mount::<ProgressBar>(ProgressBarProps::default())
        .expect("mount progress bar");
    let mut step = 0_u32;

    c.bench_function("flush/coalesced_writes", |b| {
        b.iter(|| {
            for _ in 0..16 {
                step = step.wrapping_add(1);
                let value = f64::from(step % 100);
                bar.set(ProgressBarProps {
                    progress_percentage: Some(value),
                });
            }
            host.run_microtasks().expect("flush");
            black_box(host.scheduler().flush_count())
        })
    });
}

fn countdown(c: &mut Criterion) {
    c.bench_function("flush/countdown_20s", |b| {
        b.iter(|| {
            let host = Host::new(Config::default());
            let timer = host
                .mount::<Timer>(Default::default())
                .expect("mount timer");
            let doc = host.document();
            if let Some(button) = doc.find(doc.body(), "button") {
                doc.click(button);
            }
            let fired = host.advance(Duration::from_secs(20)).expect("advance");
            timer.destroy();
            black_box(fired)
        })
    });
}

criterion_group!(benches, coalesced_writes, countdown);
criterion_main!(benches);
