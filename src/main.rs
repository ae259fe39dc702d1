fn main() {
    beach_slopes::cli::run();
}
