fn main() -> anyhow::Result<()> {
    skyport::run()
}
