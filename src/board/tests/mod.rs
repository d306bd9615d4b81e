mod perft;
mod position;
mod proptests;
mod see_tests;
