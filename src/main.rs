use card_ngin::{SceneConfig, run_card_scene};

fn main() -> anyhow::Result<()> {
    run_card_scene(SceneConfig::default())
}
