//! Cloud controller: targeting, orgs/spaces, apps and the restart producer

use super::{CloudClient, build_http_client, decode_response, request_error};
use crate::actor::{
    AppStateChange, Application, ApplicationActor, ApplicationState, ApplicationSummary,
    ApplicationSummaryActor, OperationSenders, OperationStreams, Organization, ProcessInstance,
    ProcessSummary, Space, TargetActor, TargetInfo, TargetSettings, Warnings,
};
use crate::error::ActorError;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct RootInfo {
    links: RootLinks,
}

#[derive(Debug, Deserialize)]
struct RootLinks {
    cloud_controller_v2: Option<VersionedLink>,
    cloud_controller_v3: Option<VersionedLink>,
    login: Option<super::Link>,
    uaa: Option<super::Link>,
    log_cache: Option<super::Link>,
}

#[derive(Debug, Deserialize)]
struct VersionedLink {
    meta: Option<LinkMeta>,
}

#[derive(Debug, Deserialize)]
struct LinkMeta {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    guid: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AppResource {
    guid: String,
    name: String,
    state: String,
    relationships: AppRelationships,
}

#[derive(Debug, Deserialize)]
struct AppRelationships {
    space: Relationship,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: RelationshipData,
}

#[derive(Debug, Deserialize)]
struct RelationshipData {
    guid: String,
}

impl AppResource {
    fn into_application(self) -> Application {
        Application {
            guid: self.guid,
            name: self.name,
            space_guid: self.relationships.space.data.guid,
            state: parse_app_state(&self.state),
        }
    }
}

fn parse_app_state(state: &str) -> ApplicationState {
    if state.eq_ignore_ascii_case("STARTED") {
        ApplicationState::Started
    } else {
        ApplicationState::Stopped
    }
}

#[derive(Debug, Deserialize)]
struct GuidResource {
    guid: String,
}

#[derive(Debug, Deserialize)]
struct BuildResource {
    guid: String,
    state: String,
    error: Option<String>,
    droplet: Option<GuidResource>,
}

#[derive(Debug, Deserialize)]
struct ProcessResource {
    guid: String,
    #[serde(rename = "type")]
    process_type: String,
    #[serde(default)]
    command: Option<String>,
    instances: u32,
    memory_in_mb: u64,
    disk_in_mb: u64,
}

#[derive(Debug, Deserialize)]
struct ProcessStat {
    index: u32,
    state: String,
    #[serde(default)]
    uptime: u64,
    #[serde(default)]
    usage: StatUsage,
    #[serde(default)]
    mem_quota: Option<u64>,
    #[serde(default)]
    disk_quota: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StatUsage {
    #[serde(default)]
    cpu: f64,
    #[serde(default)]
    mem: u64,
    #[serde(default)]
    disk: u64,
}

impl From<ProcessStat> for ProcessInstance {
    fn from(stat: ProcessStat) -> Self {
        ProcessInstance {
            index: stat.index,
            state: stat.state,
            uptime: Duration::from_secs(stat.uptime),
            cpu: stat.usage.cpu,
            memory_usage: stat.usage.mem,
            memory_quota: stat.mem_quota.unwrap_or_default(),
            disk_usage: stat.usage.disk,
            disk_quota: stat.disk_quota.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResource {
    url: String,
}

/// Where a restart's startup poll stands
#[derive(Debug, PartialEq)]
enum StartupProgress {
    Waiting,
    Running,
}

/// Judge instance states for one poll of the app's processes
fn startup_progress(
    app_name: &str,
    processes: &[(u32, Vec<ProcessInstance>)],
) -> Result<StartupProgress, ActorError> {
    let mut all_running = true;
    for (desired, instances) in processes {
        if *desired == 0 {
            continue;
        }
        if instances.iter().any(|i| i.state.eq_ignore_ascii_case("FLAPPING")) {
            return Err(ActorError::InstanceFlapping {
                name: app_name.to_string(),
            });
        }
        if !instances.is_empty()
            && instances
                .iter()
                .all(|i| i.state.eq_ignore_ascii_case("CRASHED"))
        {
            return Err(ActorError::InstanceCrashed {
                name: app_name.to_string(),
            });
        }
        if !instances.iter().any(ProcessInstance::running) {
            all_running = false;
        }
    }
    Ok(if all_running {
        StartupProgress::Running
    } else {
        StartupProgress::Waiting
    })
}

/// Timeouts and poll interval for one restart
#[derive(Debug, Clone, Copy)]
struct RestartTimings {
    staging_timeout: Duration,
    startup_timeout: Duration,
    polling_interval: Duration,
}

impl CloudClient {
    async fn app_processes(
        &self,
        app_guid: &str,
    ) -> Result<(Vec<ProcessResource>, Warnings), ActorError> {
        let url = format!("{}/v3/apps/{app_guid}/processes", self.api_url()?);
        self.get_all_resources(&url, &[]).await
    }

    async fn process_instances(
        &self,
        process_guid: &str,
    ) -> Result<(Vec<ProcessInstance>, Warnings), ActorError> {
        let url = format!("{}/v3/processes/{process_guid}/stats", self.api_url()?);
        let (stats, warnings): (Vec<ProcessStat>, Warnings) =
            self.get_all_resources(&url, &[]).await?;
        Ok((stats.into_iter().map(ProcessInstance::from).collect(), warnings))
    }

    async fn app_action(&self, app_guid: &str, action: &str) -> Result<Warnings, ActorError> {
        let url = format!("{}/v3/apps/{app_guid}/actions/{action}", self.api_url()?);
        let (_, warnings): (serde_json::Value, Warnings) =
            self.send_json(Method::POST, &url, &json!({})).await?;
        Ok(warnings)
    }

    /// True when the app has a current droplet to run
    async fn has_current_droplet(&self, app_guid: &str) -> Result<bool, ActorError> {
        let url = format!("{}/v3/apps/{app_guid}/droplets/current", self.api_url()?);
        match self.get_json::<serde_json::Value>(&url, &[]).await {
            Ok(_) => Ok(true),
            Err(ActorError::Api { status: 404, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Stage the newest package and set the resulting droplet as current
    async fn stage(
        &self,
        app: &Application,
        timings: RestartTimings,
        tx: &OperationSenders,
    ) -> Result<(), ActorError> {
        let api = self.api_url()?;
        let (packages, warnings): (Vec<GuidResource>, Warnings) = self
            .get_all_resources(
                &format!("{api}/v3/apps/{}/packages", app.guid),
                &[("order_by", "-created_at"), ("per_page", "1")],
            )
            .await?;
        send_warnings(tx, warnings).await;
        let package = packages.into_iter().next().ok_or_else(|| ActorError::StagingFailed {
            reason: format!("App {} has no package to stage", app.name),
        })?;

        let (build, warnings): (BuildResource, Warnings) = self
            .send_json(
                Method::POST,
                &format!("{api}/v3/builds"),
                &json!({ "package": { "guid": package.guid } }),
            )
            .await?;
        send_warnings(tx, warnings).await;

        let deadline = Instant::now() + timings.staging_timeout;
        let mut build = build;
        loop {
            match build.state.as_str() {
                "STAGED" => break,
                "FAILED" => {
                    return Err(ActorError::StagingFailed {
                        reason: build.error.unwrap_or_else(|| "Staging failed".to_string()),
                    });
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(ActorError::StagingTimeout {
                    app_name: app.name.clone(),
                    timeout: timings.staging_timeout,
                });
            }
            sleep(timings.polling_interval).await;
            let (next, warnings) = self
                .get_json(&format!("{api}/v3/builds/{}", build.guid), &[])
                .await?;
            send_warnings(tx, warnings).await;
            build = next;
        }

        let droplet = build.droplet.ok_or_else(|| ActorError::StagingFailed {
            reason: "Staged build has no droplet".to_string(),
        })?;
        let (_, warnings): (serde_json::Value, Warnings) = self
            .send_json(
                Method::PATCH,
                &format!("{api}/v3/apps/{}/relationships/current_droplet", app.guid),
                &json!({ "data": { "guid": droplet.guid } }),
            )
            .await?;
        send_warnings(tx, warnings).await;
        Ok(())
    }

    /// Poll process stats until every scaled process has a running instance
    async fn wait_for_start(
        &self,
        app: &Application,
        timings: RestartTimings,
        tx: &OperationSenders,
    ) -> Result<(), ActorError> {
        let deadline = Instant::now() + timings.startup_timeout;
        loop {
            let (processes, warnings) = self.app_processes(&app.guid).await?;
            send_warnings(tx, warnings).await;

            let mut polled = Vec::with_capacity(processes.len());
            for process in &processes {
                let (instances, warnings) = self.process_instances(&process.guid).await?;
                send_warnings(tx, warnings).await;
                polled.push((process.instances, instances));
            }

            if startup_progress(&app.name, &polled)? == StartupProgress::Running {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ActorError::StartupTimeout {
                    name: app.name.clone(),
                });
            }
            sleep(timings.polling_interval).await;
        }
    }

    async fn restart(
        &self,
        app: &Application,
        timings: RestartTimings,
        tx: &OperationSenders,
    ) -> Result<(), ActorError> {
        if app.started() {
            let _ = tx.states.send(AppStateChange::Stopping).await;
            send_warnings(tx, self.app_action(&app.guid, "stop").await?).await;
        }

        if !self.has_current_droplet(&app.guid).await? {
            let _ = tx.states.send(AppStateChange::Staging).await;
            self.stage(app, timings, tx).await?;
        }

        let _ = tx.states.send(AppStateChange::Starting).await;
        send_warnings(tx, self.app_action(&app.guid, "start").await?).await;
        self.wait_for_start(app, timings, tx).await
    }
}

async fn send_warnings(tx: &OperationSenders, warnings: Warnings) {
    for warning in warnings {
        let _ = tx.warnings.send(warning).await;
    }
}

#[async_trait]
impl TargetActor for CloudClient {
    async fn set_target(
        &self,
        settings: &TargetSettings,
    ) -> Result<(TargetInfo, Warnings), ActorError> {
        let url = settings.url.trim_end_matches('/').to_string();
        // Query the root with a client matching the requested TLS settings
        let http = build_http_client(settings.skip_ssl_validation)?;
        debug!(%url, skip_ssl_validation = settings.skip_ssl_validation, "targeting API");
        let response = http
            .get(format!("{url}/"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        let (root, warnings): (RootInfo, Warnings) = decode_response(&url, response).await?;

        let links = root.links;
        let api_version = links
            .cloud_controller_v2
            .and_then(|l| l.meta)
            .and_then(|m| m.version)
            .or_else(|| {
                links
                    .cloud_controller_v3
                    .and_then(|l| l.meta)
                    .and_then(|m| m.version)
            });
        let login = links.login.map(|l| l.href);
        let uaa = links.uaa.map(|l| l.href).or_else(|| login.clone());

        self.rebuild_http(settings.skip_ssl_validation)?;
        self.config().update(|c| {
            c.clear_target();
            c.target = Some(url.clone());
            c.api_version = api_version.clone();
            c.skip_ssl_validation = settings.skip_ssl_validation;
            c.authorization_endpoint = login;
            c.uaa_endpoint = uaa;
            c.log_cache_endpoint = links.log_cache.map(|l| l.href);
        });
        info!(%url, api_version = api_version.as_deref().unwrap_or("unknown"), "API targeted");

        Ok((TargetInfo { api_version }, warnings))
    }

    async fn get_organization_by_name(
        &self,
        name: &str,
    ) -> Result<(Organization, Warnings), ActorError> {
        let url = format!("{}/v3/organizations", self.api_url()?);
        let (orgs, warnings): (Vec<NamedResource>, Warnings) =
            self.get_all_resources(&url, &[("names", name)]).await?;
        let org = orgs
            .into_iter()
            .next()
            .ok_or_else(|| ActorError::OrganizationNotFound {
                name: name.to_string(),
            })?;
        Ok((
            Organization {
                guid: org.guid,
                name: org.name,
            },
            warnings,
        ))
    }

    async fn get_organizations(&self) -> Result<(Vec<Organization>, Warnings), ActorError> {
        let url = format!("{}/v3/organizations", self.api_url()?);
        let (orgs, warnings): (Vec<NamedResource>, Warnings) =
            self.get_all_resources(&url, &[("order_by", "name")]).await?;
        Ok((
            orgs.into_iter()
                .map(|o| Organization {
                    guid: o.guid,
                    name: o.name,
                })
                .collect(),
            warnings,
        ))
    }

    async fn get_space_by_name_and_organization(
        &self,
        name: &str,
        org_guid: &str,
    ) -> Result<(Space, Warnings), ActorError> {
        let url = format!("{}/v3/spaces", self.api_url()?);
        let (spaces, warnings): (Vec<NamedResource>, Warnings) = self
            .get_all_resources(&url, &[("names", name), ("organization_guids", org_guid)])
            .await?;
        let space = spaces
            .into_iter()
            .next()
            .ok_or_else(|| ActorError::SpaceNotFound {
                name: name.to_string(),
            })?;
        Ok((
            Space {
                guid: space.guid,
                name: space.name,
            },
            warnings,
        ))
    }

    async fn get_organization_spaces(
        &self,
        org_guid: &str,
    ) -> Result<(Vec<Space>, Warnings), ActorError> {
        let url = format!("{}/v3/spaces", self.api_url()?);
        let (spaces, warnings): (Vec<NamedResource>, Warnings) = self
            .get_all_resources(
                &url,
                &[("organization_guids", org_guid), ("order_by", "name")],
            )
            .await?;
        Ok((
            spaces
                .into_iter()
                .map(|s| Space {
                    guid: s.guid,
                    name: s.name,
                })
                .collect(),
            warnings,
        ))
    }
}

#[async_trait]
impl ApplicationActor for CloudClient {
    async fn get_application_by_name_and_space(
        &self,
        name: &str,
        space_guid: &str,
    ) -> Result<(Application, Warnings), ActorError> {
        let url = format!("{}/v3/apps", self.api_url()?);
        let (apps, warnings): (Vec<AppResource>, Warnings) = self
            .get_all_resources(&url, &[("names", name), ("space_guids", space_guid)])
            .await?;
        let app = apps
            .into_iter()
            .next()
            .ok_or_else(|| ActorError::ApplicationNotFound {
                name: name.to_string(),
            })?;
        Ok((app.into_application(), warnings))
    }

    fn restart_application(&self, app: &Application) -> OperationStreams {
        let (tx, streams) = OperationStreams::channel();
        let timings = self.config().read(|c| RestartTimings {
            staging_timeout: Duration::from_secs(c.staging_timeout_secs),
            startup_timeout: Duration::from_secs(c.startup_timeout_secs),
            polling_interval: Duration::from_secs(c.polling_interval_secs.max(1)),
        });
        let client = self.clone();
        let app = app.clone();

        tokio::spawn(async move {
            debug!(app = %app.name, "restart started");
            if let Err(err) = client.restart(&app, timings, &tx).await {
                debug!(app = %app.name, error = %err, "restart failed");
                let _ = tx.errors.send(err).await;
            }
            debug!(app = %app.name, "restart producer done");
        });

        streams
    }
}

#[async_trait]
impl ApplicationSummaryActor for CloudClient {
    async fn get_application_summary_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
        obfuscate: bool,
    ) -> Result<(ApplicationSummary, Warnings), ActorError> {
        let (app, mut warnings) = self
            .get_application_by_name_and_space(app_name, space_guid)
            .await?;
        let api = self.api_url()?;

        let (routes, more): (Vec<RouteResource>, Warnings) = self
            .get_all_resources(&format!("{api}/v3/apps/{}/routes", app.guid), &[])
            .await?;
        warnings.extend(more);

        let (processes, more) = self.app_processes(&app.guid).await?;
        warnings.extend(more);

        let mut summaries = Vec::with_capacity(processes.len());
        for process in processes {
            let (instances, more) = self.process_instances(&process.guid).await?;
            warnings.extend(more);

            // List responses redact commands; the single-process view does not
            let command = if obfuscate {
                process.command.unwrap_or_default()
            } else {
                let (full, more): (ProcessResource, Warnings) = self
                    .get_json(&format!("{api}/v3/processes/{}", process.guid), &[])
                    .await?;
                warnings.extend(more);
                full.command.unwrap_or_default()
            };

            summaries.push(ProcessSummary {
                process_type: process.process_type,
                command,
                memory_in_mb: process.memory_in_mb,
                disk_in_mb: process.disk_in_mb,
                instances,
            });
        }

        Ok((
            ApplicationSummary {
                name: app.name,
                state: app.state,
                routes: routes.into_iter().map(|r| r.url).collect(),
                processes: summaries,
            },
            warnings,
        ))
    }
}
