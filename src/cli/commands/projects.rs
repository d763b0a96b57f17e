//! List projects command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_list_projects(config: &Config, owner: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let projects = store.list_projects(owner).await?;

    if projects.is_empty() {
        println!("No projects owned by '{owner}'.");
        return Ok(());
    }

    println!("Projects of {owner} ({} total)", projects.len());
    println!("{:-<70}", "");

    for project in projects {
        let hosts = store.list_hosts(&project.id).await?;
        let domains = store.list_domains(&project.id).await?;
        let unscanned = hosts.iter().filter(|h| h.portsq == 0).count();

        println!("• {}", project.name);
        println!(
            "  ID: {} | Hosts: {} ({} unscanned) | Domains: {}",
            project.id,
            hosts.len(),
            unscanned,
            domains.len()
        );
    }

    Ok(())
}
