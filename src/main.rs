// Sensorcast binary entry point

fn main() -> anyhow::Result<()> {
    sensorcast::run()
}
