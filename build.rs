fn main() -> Result<(), Box<dyn std::error::Error>> {
	use vergen_gitcl::{CargoBuilder, Emitter, GitclBuilder};

	let cargo = CargoBuilder::all_cargo()?;
	let gitcl = GitclBuilder::all_git()?;

	Emitter::default().add_instructions(&cargo)?.add_instructions(&gitcl)?.emit()?;

	Ok(())
}
