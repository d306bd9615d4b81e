//! Fixed benchmark suite: a spread of openings, middlegames, and endgames
//! searched to a fixed depth.

pub const BENCH_DEPTH: i32 = 13;

pub const BENCH_POSITIONS: &[&str] = &[
    "rnbqnrk1/ppp3bp/3p2p1/3Ppp2/2P1P3/2N1BP2/PP1Q2PP/R3KBNR w KQ f6 0 9",
    "r1bq1rk1/1pp2ppp/2n1pn2/p2p2B1/2PP4/P1Q2N2/1P2PPPP/R3KB1R w KQ a6 0 9",
    "rn1q1rk1/pbp1bppp/1p3n2/3p4/3PP3/2NB1N2/PP3PPP/R1BQK2R w KQ - 0 9",
    "r2qkbnr/pp1npppb/2p5/7p/3P1N1P/6N1/PPP2PP1/R1BQKB1R w KQkq - 4 9",
    "rnbqnrk1/pp2bp1p/3p2p1/2pPp3/2P1P3/2N3P1/PP2NPBP/R1BQK2R w KQ - 0 9",
    "r1b1k2r/pppn1pbp/3p2p1/4p2n/2PPP2q/2NBBP2/PP2N1PP/R2QK2R w KQkq - 3 9",
    "rn2k2r/ppqbnppp/4p3/2ppP3/P2P4/2P2N2/2P2PPP/R1BQKB1R w KQkq - 1 9",
    "r1bqnrk1/pp1nbppp/3p4/2pPp3/2P1P3/2N2NP1/PP3PBP/R1BQK2R w KQ - 5 9",
    "r2qk1nr/1ppb2bp/p1np1pp1/4p3/B2PP3/2P2N2/PP3PPP/RNBQR1K1 w kq - 0 9",
    "r1bqk2r/pp1n1ppp/4pn2/2b5/3P4/3B1N2/PPP2PPP/R1BQ1RK1 w kq - 0 9",
    "rnbqkb1r/ppp1pppp/8/8/4P3/2N2N2/PP1P1PPP/R1BQK2R w KQkq - 4 9",
    "r1b1k2r/pp1n1ppp/2p1p3/q2p4/1bPPnB2/2N1P3/PPQN1PPP/R3KB1R w KQkq - 5 9",
    "r1bqnrk1/pp1nbppp/3p4/2pPp3/2P1P3/2N3P1/PP2NPBP/R1BQK2R w KQ - 5 9",
    "rn3rk1/ppq1ppbp/2pp1np1/8/2PPP1b1/2N2NP1/PP3PBP/R1BQ1RK1 w - - 1 9",
    "rn1q1rk1/ppp2pp1/3p1n1p/4p3/1bPP2bB/2N1P3/PPQ1NPPP/R3KB1R w KQ - 2 9",
    "rn1qkb1r/p4ppp/1pp1pn2/3p3b/2PP3N/1QN1P2P/PP3PP1/R1B1KB1R w KQkq - 1 9",
    "r2qk2r/ppp1ppbp/3p1np1/3Pn3/2P1P3/2N2B2/PP3PPP/R1BQK2R w KQkq - 1 9",
    "r1bqkb1r/ppp1p1pp/1n1pp3/6N1/2PP4/3n4/PP3PPP/RNBQK2R w KQkq - 0 9",
    "r2q1rk1/ppp2ppp/2np1n2/2b1pb2/2P5/2N1P1PP/PP1PNPB1/R1BQ1RK1 w - - 1 9",
    "r2qk1nr/1ppb2bp/p1np1pp1/4p1B1/B1PPP3/2N2N2/PP3PPP/R2QK2R w KQkq - 0 9",
    "r2qkb1r/pbp2pp1/1pn1p2p/3n4/3P4/P1NB1N2/1PP1QPPP/R1B1K2R w KQkq - 0 9",
    "r1b1k2r/ppqnbppp/2pp4/4p1Pn/3PP3/2N1BP2/PPPQ3P/R3KBNR w KQkq - 1 9",
    "r2q1rk1/p1pp1pbp/np2pnp1/8/3P1B2/2P1PN1P/PP1N1PP1/R2QK2R w KQ - 1 9",
    "8/pp2nkR1/5n1p/3p4/5p2/P2BP3/1PPKN3/8 b - - 0 31",
    "3n4/2k3p1/p4r2/1pp4P/5PB1/P6P/1KP5/5R2 w - - 0 32",
    "4r1k1/5p1p/6pP/2b5/1p3R2/pP2BKP1/P4P2/8 b - - 0 38",
    "1b6/4k1p1/3p3p/p6P/Bp6/2r1P1P1/4KP2/R7 w - - 0 70",
    "4k3/2Rb4/3r3p/4p1p1/5p2/7P/4R1P1/6K1 w - - 0 61",
];
