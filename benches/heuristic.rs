use bot_2048::engine::{Board, Move};
use bot_2048::policy::{score, Greedy, PolicyConfig};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = vec![Board::empty(4)];
    let mut b = Board::empty(4).with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b.clone());
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..24 {
        let (nb, changed) = b.simulate(seq[i % seq.len()]);
        if changed { b = nb.with_random_tile(&mut rng); }
        boards.push(b.clone());
    }
    boards
}

fn bench_heuristic(c: &mut Criterion) {
    let boards = corpus();
    c.bench_function("heuristic/score", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for bd in &boards { acc = acc.mul_add(1.000_000_1, score(bd)); }
            black_box(acc)
        })
    });
}

fn bench_policy(c: &mut Criterion) {
    let boards = corpus();
    for lookahead in [1usize, 2, 3] {
        c.bench_function(&format!("policy/best_move_depth{lookahead}"), |bch| {
            let mut policy = Greedy::with_config(PolicyConfig { lookahead, ..PolicyConfig::default() });
            bch.iter(|| {
                let mut picked = 0u32;
                for bd in &boards { picked += policy.best_move(bd).is_some() as u32; }
                black_box(picked)
            })
        });
    }
}

criterion_group!(heuristic, bench_heuristic, bench_policy);
criterion_main!(heuristic);
