use super::Settings;
use crate::output::{print_json, print_table};
use orgsweep_core::census::external_collaborators;

pub fn run(settings: &Settings, list: bool) -> anyhow::Result<()> {
    let config = settings.load_config()?;
    let collaborators = external_collaborators(&config);

    if settings.json {
        #[derive(serde::Serialize)]
        struct CensusOutput<'a> {
            count: usize,
            collaborators: &'a [orgsweep_core::resource::RepositoryCollaborator],
        }
        return print_json(&CensusOutput {
            count: collaborators.len(),
            collaborators: &collaborators,
        });
    }

    if list {
        let rows = collaborators
            .iter()
            .map(|c| {
                vec![
                    c.repository.clone(),
                    c.username.clone(),
                    c.permission.to_string(),
                ]
            })
            .collect();
        print_table(&["REPOSITORY", "USERNAME", "PERMISSION"], rows);
    } else {
        println!("{}", collaborators.len());
    }
    Ok(())
}
