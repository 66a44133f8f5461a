//! Short alias for the skyport binary

fn main() -> anyhow::Result<()> {
    skyport::run()
}
