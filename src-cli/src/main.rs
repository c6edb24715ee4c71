fn main() -> std::process::ExitCode {
    app_lib::run()
}
