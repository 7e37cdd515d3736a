use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use common::{TaskId, TaskOf, Workflow, WorkflowStatus};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::backend::TaskBackend;
use crate::error::ClientError;

/// Resultado de un refresh. El error va en `Arc` porque un mismo fetch se
/// entrega a todos los que pidieron refresh mientras estaba en vuelo.
pub type RefreshResult<T> = std::result::Result<T, Arc<ClientError>>;

type SharedRefresh<W> = Shared<BoxFuture<'static, RefreshResult<TaskOf<W>>>>;

const UPDATES_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Polling,
    Refreshing,
}

struct Poller {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Pedido del usuario y loops vivos, bajo el mismo lock.
///
/// `enabled` es el flag: sobrevive a los status terminales. `loops` sólo
/// tiene entrada mientras hay un loop corriendo, o sea mientras el flag
/// está prendido y la tarea no es terminal.
#[derive(Default)]
struct PollState {
    enabled: HashSet<TaskId>,
    loops: HashMap<TaskId, Poller>,
}

/// Mantiene frescas las copias locales de las tareas.
///
/// - `refresh` trae la tarea y reemplaza la copia entera; si falla, la copia
///   queda como estaba.
/// - Como máximo hay un fetch en vuelo por `task_id`; los pedidos que llegan
///   mientras tanto esperan ese mismo resultado.
/// - Con auto-polling prendido se refresca cada `interval` mientras el status
///   no sea terminal. Si la tarea sale de un status terminal, el polling se
///   retoma solo.
pub struct PollingController<W: Workflow, B: TaskBackend<W>> {
    backend: Arc<B>,
    interval: Duration,
    cache: Arc<Mutex<HashMap<TaskId, TaskOf<W>>>>,
    // fetches en vuelo, compartidos entre quienes pidieron refresh
    in_flight: Arc<Mutex<HashMap<TaskId, SharedRefresh<W>>>>,
    polling: Arc<Mutex<PollState>>,
    generation: Arc<AtomicU64>,
    updates: broadcast::Sender<TaskOf<W>>,
}

impl<W: Workflow, B: TaskBackend<W>> Clone for PollingController<W, B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            interval: self.interval,
            cache: self.cache.clone(),
            in_flight: self.in_flight.clone(),
            polling: self.polling.clone(),
            generation: self.generation.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl<W: Workflow, B: TaskBackend<W>> PollingController<W, B> {
    pub fn new(backend: Arc<B>, interval: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self {
            backend,
            interval,
            cache: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            polling: Arc::new(Mutex::new(PollState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            updates,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn cached(&self, task_id: &str) -> Option<TaskOf<W>> {
        lock(&self.cache).get(task_id).cloned()
    }

    /// Cada copia que se aplica a la caché se publica acá.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskOf<W>> {
        self.updates.subscribe()
    }

    pub fn state(&self, task_id: &str) -> ControllerState {
        if lock(&self.in_flight).contains_key(task_id) {
            ControllerState::Refreshing
        } else if self.is_polling(task_id) {
            ControllerState::Polling
        } else {
            ControllerState::Idle
        }
    }

    /// El flag de auto-polling, tal como lo dejó el usuario.
    pub fn is_auto_polling(&self, task_id: &str) -> bool {
        lock(&self.polling).enabled.contains(task_id)
    }

    /// Si hay un loop de polling corriendo para la tarea.
    pub fn is_polling(&self, task_id: &str) -> bool {
        lock(&self.polling).loops.contains_key(task_id)
    }

    /// Trae la tarea del backend y actualiza la caché.
    pub async fn refresh(&self, task_id: &str) -> RefreshResult<TaskOf<W>> {
        let fut = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(task_id) {
                Some(existing) => {
                    debug!(kind = W::KIND, task_id, "refresh en vuelo, se reutiliza");
                    existing.clone()
                }
                None => {
                    let fut = self.spawn_fetch(task_id.to_string());
                    in_flight.insert(task_id.to_string(), fut.clone());
                    fut
                }
            }
        };

        fut.await
    }

    // Se llama con el lock de in_flight tomado, así la tarea no puede
    // sacarse del mapa antes de haber sido insertada.
    fn spawn_fetch(&self, task_id: TaskId) -> SharedRefresh<W> {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let result = this.backend.fetch(&task_id).await;
            lock(&this.in_flight).remove(&task_id);

            match result {
                Ok(task) => Ok(this.apply(&task_id, task)),
                Err(e) => {
                    warn!(kind = W::KIND, task_id = %task_id, "refresh falló: {}", e);
                    Err(Arc::new(e))
                }
            }
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Arc::new(ClientError::Join(e.to_string()))))
        }
        .boxed()
        .shared()
    }

    /// Reemplaza la copia en caché salvo que la nueva sea más vieja
    /// (`updated_at` menor). Devuelve la copia vigente.
    fn apply(&self, task_id: &str, task: TaskOf<W>) -> TaskOf<W> {
        let mut cache = lock(&self.cache);

        if let Some(current) = cache.get(task_id) {
            if current.is_newer_than(&task) {
                debug!(
                    kind = W::KIND,
                    task_id,
                    "respuesta vieja descartada (updated_at {:?} < {:?})",
                    task.updated_at,
                    current.updated_at
                );
                return current.clone();
            }
            if current.status != task.status {
                info!(
                    kind = W::KIND,
                    task_id,
                    "status {} -> {}",
                    current.status,
                    task.status
                );
            }
        }

        cache.insert(task_id.to_string(), task.clone());
        drop(cache);

        if !task.status.is_terminal() {
            self.resume_polling(task_id);
        }

        // sin suscriptores el send falla y no importa
        let _ = self.updates.send(task.clone());
        task
    }

    fn is_terminal(&self, task_id: &str) -> bool {
        lock(&self.cache)
            .get(task_id)
            .map(|t| t.status.is_terminal())
            .unwrap_or(false)
    }

    /// Prende o apaga el flag de auto-polling.
    ///
    /// Con el flag prendido el loop corre sólo mientras la tarea no sea
    /// terminal; para una tarea terminal queda a la espera de que el backend
    /// la mueva.
    pub fn set_auto_polling(&self, task_id: &str, enabled: bool) {
        let mut polling = lock(&self.polling);

        if !enabled {
            polling.enabled.remove(task_id);
            if let Some(poller) = polling.loops.remove(task_id) {
                poller.handle.abort();
                info!(kind = W::KIND, task_id, "auto-polling detenido");
            }
            return;
        }

        polling.enabled.insert(task_id.to_string());
        if polling.loops.contains_key(task_id) {
            return;
        }
        if self.is_terminal(task_id) {
            debug!(kind = W::KIND, task_id, "tarea terminal, el polling queda en espera");
            return;
        }
        self.start_loop(&mut polling, task_id);
    }

    // La tarea volvió a un status no terminal (ej: completed -> prompts_updated)
    fn resume_polling(&self, task_id: &str) {
        let mut polling = lock(&self.polling);
        if polling.enabled.contains(task_id) && !polling.loops.contains_key(task_id) {
            info!(kind = W::KIND, task_id, "la tarea salió de un status terminal, se retoma el polling");
            self.start_loop(&mut polling, task_id);
        }
    }

    fn start_loop(&self, polling: &mut PollState, task_id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(self.clone().poll_loop(task_id.to_string(), generation));
        polling
            .loops
            .insert(task_id.to_string(), Poller { generation, handle });

        info!(
            kind = W::KIND,
            task_id,
            "auto-polling cada {:?}",
            self.interval
        );
    }

    async fn poll_loop(self, task_id: TaskId, generation: u64) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // una acción pudo haber dejado la tarea en terminal entre ticks
            if !self.is_terminal(&task_id) {
                match self.refresh(&task_id).await {
                    Ok(task) if task.status.is_terminal() => {
                        info!(
                            kind = W::KIND,
                            task_id = %task_id,
                            "status terminal {}, fin del polling",
                            task.status
                        );
                    }
                    Ok(_) => continue,
                    // ya quedó logueado; el próximo tick reintenta
                    Err(_) => continue,
                }
            }

            // Se decide bajo el lock de polling: si otra copia sacó a la
            // tarea del terminal mientras tanto, el loop sigue.
            let finished = {
                let mut polling = lock(&self.polling);
                if self.is_terminal(&task_id) {
                    if polling.loops.get(&task_id).map(|p| p.generation) == Some(generation) {
                        polling.loops.remove(&task_id);
                    }
                    true
                } else {
                    false
                }
            };
            if finished {
                break;
            }
        }
    }

    /// Corta todos los loops de polling y apaga los flags.
    pub fn shutdown(&self) {
        let mut polling = lock(&self.polling);
        polling.enabled.clear();
        for (task_id, poller) in polling.loops.drain() {
            debug!(kind = W::KIND, task_id = %task_id, "abortando polling");
            poller.handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use common::{EventStatus, EventTask, EventWorkflow, Task};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn event(status: &str, updated_at: f64) -> EventTask {
        let mut task = Task::new("ev-1", EventStatus::parse(status));
        task.updated_at = Some(updated_at);
        task
    }

    /// Devuelve las respuestas en orden; la última se repite.
    /// `None` simula una caída del backend.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Option<EventTask>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Option<EventTask>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskBackend<EventWorkflow> for ScriptedBackend {
        async fn fetch(&self, _task_id: &str) -> Result<EventTask> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    script.front().cloned().unwrap()
                }
            };
            next.ok_or_else(|| {
                ClientError::api_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "down")
            })
        }
    }

    /// Bloquea el fetch hasta que el test lo libere.
    struct GatedBackend {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskBackend<EventWorkflow> for GatedBackend {
        async fn fetch(&self, _task_id: &str) -> Result<EventTask> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(event("images_ready", 1.0))
        }
    }

    fn controller<B: TaskBackend<EventWorkflow>>(
        backend: Arc<B>,
    ) -> PollingController<EventWorkflow, B> {
        PollingController::new(backend, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn refresh_reemplaza_la_copia_en_cache() {
        let backend = ScriptedBackend::new(vec![Some(event("announcement_ready", 1.0))]);
        let poller = controller(backend.clone());
        assert!(poller.cached("ev-1").is_none());

        let task = poller.refresh("ev-1").await.unwrap();

        assert_eq!(task.status, EventStatus::AnnouncementReady);
        assert_eq!(poller.cached("ev-1"), Some(task));
        assert_eq!(poller.state("ev-1"), ControllerState::Idle);
    }

    #[tokio::test]
    async fn refresh_fallido_no_toca_la_cache() {
        let backend = ScriptedBackend::new(vec![Some(event("images_ready", 1.0)), None]);
        let poller = controller(backend.clone());

        let first = poller.refresh("ev-1").await.unwrap();
        let err = poller.refresh("ev-1").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(poller.cached("ev-1"), Some(first));
    }

    #[tokio::test]
    async fn refresh_doble_es_idempotente() {
        let backend = ScriptedBackend::new(vec![Some(event("images_ready", 5.0))]);
        let poller = controller(backend.clone());

        let once = poller.refresh("ev-1").await.unwrap();
        let twice = poller.refresh("ev-1").await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(poller.cached("ev-1"), Some(once));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn respuesta_vieja_no_pisa_una_nueva() {
        let backend = ScriptedBackend::new(vec![
            Some(event("images_ready", 10.0)),
            Some(event("generating_images", 5.0)),
        ]);
        let poller = controller(backend.clone());

        poller.refresh("ev-1").await.unwrap();
        let second = poller.refresh("ev-1").await.unwrap();

        assert_eq!(second.status, EventStatus::ImagesReady);
        assert_eq!(poller.cached("ev-1").unwrap().updated_at, Some(10.0));
    }

    #[tokio::test]
    async fn refresh_concurrentes_se_coalescen() {
        let backend = Arc::new(GatedBackend {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let poller = controller(backend.clone());

        let a = {
            let p = poller.clone();
            tokio::spawn(async move { p.refresh("ev-1").await })
        };
        let b = {
            let p = poller.clone();
            tokio::spawn(async move { p.refresh("ev-1").await })
        };

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(poller.state("ev-1"), ControllerState::Refreshing);

        backend.gate.notify_one();
        let ra = a.await.unwrap().unwrap();
        let rb = b.await.unwrap().unwrap();

        assert_eq!(ra, rb);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state("ev-1"), ControllerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_se_detiene_en_status_terminal() {
        let backend = ScriptedBackend::new(vec![
            Some(event("generating_prompts", 1.0)),
            Some(event("generating_videos", 2.0)),
            Some(event("completed", 3.0)),
        ]);
        let poller = controller(backend.clone());

        poller.set_auto_polling("ev-1", true);
        assert_eq!(poller.state("ev-1"), ControllerState::Polling);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.calls(), 3);
        // el loop terminó pero el flag sigue prendido
        assert!(!poller.is_polling("ev-1"));
        assert!(poller.is_auto_polling("ev-1"));
        assert_eq!(poller.state("ev-1"), ControllerState::Idle);
        assert_eq!(poller.cached("ev-1").unwrap().status, EventStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn no_arranca_polling_si_ya_es_terminal() {
        let backend = ScriptedBackend::new(vec![Some(event("error", 1.0))]);
        let poller = controller(backend.clone());
        poller.refresh("ev-1").await.unwrap();

        poller.set_auto_polling("ev-1", true);
        assert!(poller.is_auto_polling("ev-1"));
        assert!(!poller.is_polling("ev-1"));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn el_polling_se_retoma_si_la_tarea_sale_de_terminal() {
        let backend = ScriptedBackend::new(vec![
            Some(event("error", 1.0)),
            Some(event("generating_images", 2.0)),
            Some(event("images_ready", 3.0)),
            Some(event("completed", 4.0)),
        ]);
        let poller = controller(backend.clone());
        poller.refresh("ev-1").await.unwrap();

        poller.set_auto_polling("ev-1", true);
        assert!(!poller.is_polling("ev-1"));

        // un refresh manual (ej: después de una acción) la saca de error
        poller.refresh("ev-1").await.unwrap();
        assert!(poller.is_polling("ev-1"));

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.calls(), 4);
        assert_eq!(poller.cached("ev-1").unwrap().status, EventStatus::Completed);
        assert!(!poller.is_polling("ev-1"));
        assert!(poller.is_auto_polling("ev-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn sin_flag_no_se_retoma_nada() {
        let backend = ScriptedBackend::new(vec![
            Some(event("completed", 1.0)),
            Some(event("generating_videos", 2.0)),
        ]);
        let poller = controller(backend.clone());
        poller.refresh("ev-1").await.unwrap();
        poller.refresh("ev-1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!poller.is_polling("ev-1"));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn apagar_auto_polling_corta_los_ticks() {
        let backend = ScriptedBackend::new(vec![Some(event("generating_images", 1.0))]);
        let poller = controller(backend.clone());

        poller.set_auto_polling("ev-1", true);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let seen = backend.calls();
        assert!(seen >= 2, "esperaba varios ticks, hubo {seen}");

        poller.set_auto_polling("ev-1", false);
        assert!(!poller.is_auto_polling("ev-1"));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(backend.calls(), seen);
        assert_eq!(poller.state("ev-1"), ControllerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn errores_de_red_no_cortan_el_polling() {
        let backend = ScriptedBackend::new(vec![
            None,
            None,
            Some(event("images_ready", 1.0)),
        ]);
        let poller = controller(backend.clone());
        let mut updates = poller.subscribe();

        poller.set_auto_polling("ev-1", true);
        let task = updates.recv().await.unwrap();

        assert_eq!(task.status, EventStatus::ImagesReady);
        assert!(backend.calls() >= 3);
        assert!(poller.is_auto_polling("ev-1"));
        poller.shutdown();
        assert!(!poller.is_auto_polling("ev-1"));
    }
}
