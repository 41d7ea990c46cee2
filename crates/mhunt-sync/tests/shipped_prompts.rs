use mhunt_core::RunMode;
use mhunt_sync::PromptSet;

#[test]
fn shipped_prompts_exist_for_every_mode() {
    let shipped = PromptSet::load("../../prompts");
    let generic = PromptSet::generic();
    for mode in RunMode::ALL {
        let text = shipped.for_mode(mode);
        assert_ne!(text, generic.for_mode(mode), "{mode} prompt missing");
        assert!(text.contains("JSON array"), "{mode} prompt must ask for a JSON array");
        assert!(text.contains(mode.as_str()), "{mode} prompt should name its sweep");
    }
}
