use umbra::uci::Engine;

fn main() {
    umbra::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    Engine::new().main_loop(&args);
}
