//! Projection round-trip benchmarks
//!
//! Measures a full deployment over the in-process bus: projector setup, one
//! invocation at every participant and teardown.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};

use locus_choreography::{choreography, run, Choreo, LocalBus};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum Role {
    Ping,
    Pong,
}

fn bench_round_trips(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let rally = choreography(|op: Choreo<Role>, rounds: u32| async move {
        let mut ball = op.locally(Role::Ping, |_| Ok(0u64))?;
        for _ in 0..rounds {
            let at_pong = op.comm(Role::Ping, Role::Pong, &ball).await?;
            let hit = op.locally(Role::Pong, |un| Ok(un.get(&at_pong)? + 1))?;
            ball = op.comm(Role::Pong, Role::Ping, &hit).await?;
        }
        Ok(())
    });

    let mut group = c.benchmark_group("rally");
    for rounds in [1u32, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &rounds, |b, &rounds| {
            b.iter(|| {
                runtime.block_on(async {
                    let bus = LocalBus::new([Role::Ping, Role::Pong]);
                    let (ping, pong) = futures::join!(
                        run(bus.transport(Role::Ping), Role::Ping, &rally, black_box(rounds)),
                        run(bus.transport(Role::Pong), Role::Pong, &rally, black_box(rounds)),
                    );
                    ping.unwrap();
                    pong.unwrap();
                })
            })
        });
    }
    group.finish();
}

fn bench_broadcast_fanout(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let decide = choreography(|op: Choreo<Role>, (): ()| async move {
        let decision = op.locally(Role::Ping, |_| Ok(true))?;
        op.broadcast(Role::Ping, &decision).await
    });

    c.bench_function("broadcast", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let bus = LocalBus::new([Role::Ping, Role::Pong]);
                let (ping, pong) = futures::join!(
                    run(bus.transport(Role::Ping), Role::Ping, &decide, ()),
                    run(bus.transport(Role::Pong), Role::Pong, &decide, ()),
                );
                black_box((ping.unwrap(), pong.unwrap()))
            })
        })
    });
}

criterion_group!(benches, bench_round_trips, bench_broadcast_fanout);
criterion_main!(benches);
