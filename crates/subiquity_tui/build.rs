use vergen::{BuildBuilder, Emitter};
use vergen_git2::Git2Builder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::default();
    emitter.add_instructions(&BuildBuilder::all_build()?)?;
    if std::env::var("VERGEN_IDEMPOTENT").is_err() {
        let git_instructions = Git2Builder::default()
            .sha(true)
            .describe(true, true, None)
            .dirty(true)
            .build()?;
        let _ = emitter.add_instructions(&git_instructions);
    }
    let _ = emitter.emit();

    Ok(())
}
