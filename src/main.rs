use threaded_shell::{Interpreter, Options};

fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(options.log_level())
        .with_target(false)
        .init();

    Interpreter::new(options).run()
}
