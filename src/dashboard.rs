//! Terminal host for the insight widgets.
//!
//! Mounts one polling controller per enabled widget and logs a status line
//! every time a widget publishes. Reads `r`/`refresh` and `q`/`quit` from
//! stdin, applies config edits as they land, and unmounts everything on
//! Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::client::InsightsClient;
use crate::api::source::{CredentialSource, DataSource, HttpSource};
use crate::error::ConfigError;
use crate::poller::{FetchState, FetchStatus, PollOptions, PollingController};
use crate::render::{render_line, Summary};
use crate::state::{load_config, AppState};
use crate::types::WidgetsConfig;
use crate::widgets::anomalies::AnomalyNormalizer;
use crate::widgets::forecast::ForecastNormalizer;
use crate::widgets::model_health::ModelHealthNormalizer;
use crate::widgets::price_optimization::PriceOptimizationNormalizer;
use crate::widgets::realtime::RealtimeNormalizer;
use crate::widgets::segmentation::SegmentationNormalizer;
use crate::widgets::{Widget, WidgetKind};

/// A mounted widget with its concrete params and model erased.
trait MountedWidget: Send + Sync {
    fn kind(&self) -> WidgetKind;
    fn status(&self) -> FetchStatus;
    /// Push this widget's params from `widgets`. True if they changed.
    fn apply(&self, widgets: &WidgetsConfig) -> bool;
    fn refresh(&self) -> bool;
    fn unmount(&self);
}

struct Mounted<W: Widget> {
    controller: PollingController<W::Params, W>,
    view: JoinHandle<()>,
}

impl<W> MountedWidget for Mounted<W>
where
    W: Widget,
    W::Model: Summary,
{
    fn kind(&self) -> WidgetKind {
        W::KIND
    }

    fn status(&self) -> FetchStatus {
        self.controller.snapshot().status
    }

    fn apply(&self, widgets: &WidgetsConfig) -> bool {
        self.controller
            .set_params(W::settings(widgets).params.clone())
    }

    fn refresh(&self) -> bool {
        self.controller.refresh()
    }

    fn unmount(&self) {
        self.controller.stop();
        self.view.abort();
    }
}

/// Commands accepted on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "refresh" => Some(Command::Refresh),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub struct Dashboard {
    state: Arc<AppState>,
    base_url: String,
    widgets: Vec<Box<dyn MountedWidget>>,
}

impl Dashboard {
    /// Mount and start every widget enabled in the current config.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(state: Arc<AppState>, client: Arc<InsightsClient>) -> Self {
        let config = state.config();
        let mut dashboard = Self {
            state,
            base_url: config.api.base_url.clone(),
            widgets: Vec::new(),
        };

        dashboard.mount_widget::<ForecastNormalizer>(&client, &config.widgets);
        dashboard.mount_widget::<PriceOptimizationNormalizer>(&client, &config.widgets);
        dashboard.mount_widget::<SegmentationNormalizer>(&client, &config.widgets);
        dashboard.mount_widget::<AnomalyNormalizer>(&client, &config.widgets);
        dashboard.mount_widget::<ModelHealthNormalizer>(&client, &config.widgets);
        dashboard.mount_widget::<RealtimeNormalizer>(&client, &config.widgets);

        log::info!("Dashboard: {} widgets mounted", dashboard.widgets.len());
        dashboard
    }

    fn mount_widget<W>(&mut self, client: &Arc<InsightsClient>, widgets: &WidgetsConfig)
    where
        W: Widget,
        W::Model: Summary,
    {
        let settings = W::settings(widgets);
        if !settings.enabled {
            log::info!("Dashboard: {} disabled", W::KIND.label());
            return;
        }

        let source: Arc<dyn DataSource<W::Params>> =
            Arc::new(HttpSource::new(Arc::clone(client), W::KIND.endpoint()));
        let credentials: Arc<dyn CredentialSource> = self.state.clone();
        let options = PollOptions::new(W::KIND.label()).with_interval(settings.interval(W::KIND));

        let controller = PollingController::new(
            source,
            W::default(),
            credentials,
            settings.params.clone(),
            options,
        );
        let view = spawn_view(W::KIND, controller.subscribe());
        controller.start();

        self.widgets.push(Box::new(Mounted::<W> { controller, view }));
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn kinds(&self) -> Vec<WidgetKind> {
        self.widgets.iter().map(|w| w.kind()).collect()
    }

    pub fn status(&self, kind: WidgetKind) -> Option<FetchStatus> {
        self.widgets
            .iter()
            .find(|w| w.kind() == kind)
            .map(|w| w.status())
    }

    pub fn refresh_all(&self) {
        let started = self.widgets.iter().filter(|w| w.refresh()).count();
        log::info!("Dashboard: refreshing {} widgets", started);
    }

    /// Re-read the config at `path` and push it to the mounted widgets.
    ///
    /// A file that fails to load is logged and ignored. Widgets whose params
    /// changed refetch through `set_params`. On a token change the rest
    /// refetch as well.
    pub fn reload(&self, path: &Path) {
        let config = match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Dashboard: ignoring config change: {}", e);
                return;
            }
        };

        if config.api.base_url != self.base_url {
            log::warn!(
                "Dashboard: baseUrl changed to {}; restart to apply",
                config.api.base_url
            );
        }
        for kind in WidgetKind::ALL {
            let enabled = is_enabled(&config.widgets, kind);
            let mounted = self.widgets.iter().any(|w| w.kind() == kind);
            if enabled && !mounted {
                log::warn!("Dashboard: {} enabled; restart to mount it", kind.label());
            }
        }

        let widgets = config.widgets.clone();
        let token_changed = self.state.replace_config(config);

        let mut changed = 0;
        for widget in &self.widgets {
            if widget.apply(&widgets) {
                changed += 1;
            } else if token_changed {
                widget.refresh();
            }
        }

        log::info!(
            "Dashboard: config reloaded ({} params changed, token changed: {})",
            changed,
            token_changed
        );
    }

    /// Stop every controller. Nothing publishes afterwards.
    pub fn unmount(&mut self) {
        for widget in self.widgets.drain(..) {
            widget.unmount();
        }
        log::info!("Dashboard: unmounted");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        for widget in &self.widgets {
            widget.unmount();
        }
    }
}

fn is_enabled(widgets: &WidgetsConfig, kind: WidgetKind) -> bool {
    match kind {
        WidgetKind::Forecast => widgets.forecast.enabled,
        WidgetKind::PriceOptimization => widgets.price_optimization.enabled,
        WidgetKind::Segmentation => widgets.segmentation.enabled,
        WidgetKind::Anomalies => widgets.anomalies.enabled,
        WidgetKind::ModelHealth => widgets.model_health.enabled,
        WidgetKind::Realtime => widgets.realtime.enabled,
    }
}

/// Log one line per published state until the controller goes away.
fn spawn_view<T>(kind: WidgetKind, mut rx: watch::Receiver<FetchState<T>>) -> JoinHandle<()>
where
    T: Summary + Send + Sync + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let (status, line) = {
                let state = rx.borrow_and_update();
                (state.status, render_line(kind.label(), &*state))
            };
            if status == FetchStatus::Error {
                log::warn!("{}", line);
            } else {
                log::info!("{}", line);
            }
        }
    })
}

/// Run the dashboard until Ctrl-C or `quit`.
pub async fn run(config_path: PathBuf) -> Result<(), ConfigError> {
    let config = load_config(&config_path)?;
    let client = Arc::new(InsightsClient::new(&config.api)?);
    log::info!("Dashboard: using API at {}", client.base_url());

    let state = Arc::new(AppState::new(config));
    let mut dashboard = Dashboard::mount(state, client);
    if dashboard.is_empty() {
        log::warn!("Dashboard: no widgets enabled in {}", config_path.display());
    }

    let (reload_tx, mut reload_rx) = mpsc::channel(4);
    let watcher = crate::watcher::start_config_watcher(config_path.clone(), reload_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Dashboard: interrupted");
                break;
            }
            Some(()) = reload_rx.recv() => dashboard.reload(&config_path),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Some(Command::Refresh) => dashboard.refresh_all(),
                    Some(Command::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => log::warn!(
                        "Dashboard: unknown command '{}' (r = refresh, q = quit)",
                        line.trim()
                    ),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    log::warn!("Dashboard: stdin unavailable: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    dashboard.unmount();
    watcher.abort();
    Ok(())
}
