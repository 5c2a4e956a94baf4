fn main() -> Result<(), Box<dyn std::error::Error>> {
    opencreator::cli::main()
}
