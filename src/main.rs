use credbridge::ui::output;

fn main() {
    if let Err(err) = credbridge::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
