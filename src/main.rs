fn main() -> std::process::ExitCode {
    medinest_lib::run()
}
