use super::downloader::Tier;
use super::pipeline::record_error;
use super::sieve::{sieve, Level};
use super::wordlist::combine_wordlists;
use super::{ActivePipeline, Workspace, FINAL_FILE};
use crate::context::ScanContext;
use crate::gate::{members_only, BruteforceJob, ResolverLists};
use crate::hostname::merge_unique;
use crate::model::write_lines;
use crate::{Error, Result};
use std::path::PathBuf;
use tracing::{info, instrument};

const DEEP_SIEVE_TOP: usize = 5;

/// Sieve depth paired with the wordlist tier bruteforced under it.
const PASSES: [(usize, Tier); 3] = [(3, Tier::Level2), (4, Tier::Level3), (5, Tier::Levels4Plus)];

impl ActivePipeline {
    /// Bruteforces tiered wordlists under the most common zones at depths 3 to 5.
    #[instrument(name = "deep", level = "info", skip_all)]
    pub(super) async fn run_deep(
        &self,
        ctx: &ScanContext,
        workspace: &Workspace,
        resolvers: &ResolverLists,
        resolved: &[String],
        apex: &str,
        errors: &mut Vec<String>,
    ) -> Vec<String> {
        if let Err(err) = write_lines(&workspace.path(FINAL_FILE), resolved) {
            record_error(errors, "deep", err);
            return Vec::new();
        }

        let zones = match deep_sieves(resolved).await {
            Ok(zones) => zones,
            Err(err) => {
                record_error(errors, "deep sieve", err);
                return Vec::new();
            }
        };

        let mut found: Vec<String> = Vec::new();
        for ((factor, tier), domains) in PASSES.iter().zip(zones) {
            let stage = format!("deep {}", tier.file_stem());
            if ctx.is_done() {
                record_error(errors, &stage, Error::Cancelled);
                break;
            }
            if domains.is_empty() {
                info!("{:12} - f{} no zones", "DEEP", factor);
                continue;
            }

            match self.bruteforce_tier(ctx, workspace, resolvers, *factor, *tier, &domains).await {
                Ok(names) => {
                    let names = members_only(names, apex);
                    info!("{:12} - {} {}/{}", "DEEP", tier.file_stem(), names.len(), domains.len());
                    found = merge_unique(&[&found[..], &names[..]]);
                }
                Err(err) => record_error(errors, &stage, err),
            }
        }

        found
    }

    async fn bruteforce_tier(
        &self,
        ctx: &ScanContext,
        workspace: &Workspace,
        resolvers: &ResolverLists,
        factor: usize,
        tier: Tier,
        domains: &[String],
    ) -> Result<Vec<String>> {
        let wordlist = self.tier_wordlist(workspace, tier).await?;

        let domains_file = workspace.path(&format!("dsieve_f{factor}_output.txt"));
        write_lines(&domains_file, domains)?;

        let job = BruteforceJob {
            wordlist,
            domains: domains_file,
            resolvers: resolvers.clone(),
            output: workspace.path(&format!("deep_f{factor}_resolved.txt")),
        };
        self.gate.bruteforce(ctx, &job).await
    }

    /// Inventory and cloud lists of a tier merged into one cached file.
    async fn tier_wordlist(&self, workspace: &Workspace, tier: Tier) -> Result<PathBuf> {
        let [inventory_url, cloud_url] = tier.urls();
        let stem = tier.file_stem();

        let inventory = self
            .downloader
            .cached_lines(&inventory_url, &workspace.path(&format!("trickest_inventory_{stem}.txt")))
            .await?;
        let cloud = self
            .downloader
            .cached_lines(&cloud_url, &workspace.path(&format!("trickest_cloud_{stem}.txt")))
            .await?;

        let merged_path = workspace.path(&format!("trickest_{stem}_merged.txt"));
        write_lines(&merged_path, &combine_wordlists(&[&inventory[..], &cloud[..]]))?;
        Ok(merged_path)
    }
}

/// The three sieve passes run side by side on the blocking pool.
async fn deep_sieves(resolved: &[String]) -> Result<Vec<Vec<String>>> {
    let handles: Vec<_> = PASSES
        .iter()
        .map(|(factor, _)| {
            let (factor, input) = (*factor, resolved.to_vec());
            tokio::task::spawn_blocking(move || sieve(&input, Level::exact(factor), DEEP_SIEVE_TOP))
        })
        .collect();

    let mut zones = Vec::with_capacity(handles.len());
    for handle in handles {
        zones.push(handle.await?);
    }
    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deep_sieves_follow_pass_depths() {
        let resolved = vec![
            "a.b.c.example.com".to_string(),
            "x.b.c.example.com".to_string(),
            "b.c.example.com".to_string(),
        ];
        let zones = deep_sieves(&resolved).await.unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0], vec!["c.example.com"]);
        assert_eq!(zones[1], vec!["b.c.example.com"]);
        assert_eq!(zones[2], vec!["a.b.c.example.com", "x.b.c.example.com"]);
    }
}
