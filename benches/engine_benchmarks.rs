use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use umbra::board::movegen::{self, GenFlags};
use umbra::board::types::MoveList;
use umbra::board::{perft, Position};
use umbra::search::Settings;
use umbra::tb::Tablebases;
use umbra::threads::search_sync;
use umbra::tt::TranspositionTable;

fn bench_movegen(c: &mut Criterion) {
    umbra::init();
    let kiwipete = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();

    c.bench_function("movegen_kiwipete", |b| {
        b.iter(|| {
            let mut list = MoveList::new();
            movegen::generate_moves(&kiwipete, GenFlags::ALL, &mut list);
            list.len()
        });
    });
}

fn bench_perft(c: &mut Criterion) {
    umbra::init();
    let startpos = Position::startpos();

    c.bench_function("perft_startpos_4", |b| {
        b.iter(|| perft(&startpos, 4));
    });
}

fn bench_search(c: &mut Criterion) {
    umbra::init();
    let pos = Position::from_fen(
        "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
    )
    .unwrap();

    c.bench_function("search_depth_8", |b| {
        b.iter(|| {
            let mut settings = Settings::new(pos);
            settings.depth = 8;
            settings.minimal = true;
            search_sync(
                settings,
                Arc::new(TranspositionTable::new(16)),
                Arc::new(Tablebases::new()),
            )
        });
    });
}

criterion_group!(benches, bench_movegen, bench_perft, bench_search);
criterion_main!(benches);
