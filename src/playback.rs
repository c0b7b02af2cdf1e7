use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Sample, SampleId};
use crate::download::{Downloader, Fetcher};
use crate::error::SoundrawError;
use crate::player::Player;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub sample_id: SampleId,
    pub temp_path: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Starting(SampleId),
    Playing(PlaybackSession),
    Stopping,
}

impl PlaybackState {
    pub fn active_sample(&self) -> Option<&SampleId> {
        match self {
            PlaybackState::Starting(id) => Some(id),
            PlaybackState::Playing(session) => Some(&session.sample_id),
            PlaybackState::Idle | PlaybackState::Stopping => None,
        }
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        match self {
            PlaybackState::Playing(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }
}

pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(Option<&SampleId>) + Send + Sync>;

#[derive(Default)]
struct ObserverRegistry {
    next_id: SubscriptionId,
    listeners: Vec<(SubscriptionId, Listener)>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<PlaybackState>,
    observers: Mutex<ObserverRegistry>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: PlaybackState) {
        let active = {
            let mut state = self.state();
            tracing::debug!(from = ?*state, to = ?next, "playback transition");
            *state = next;
            state.active_sample().cloned()
        };
        // Delivery holds the registry lock so subscribers see changes in order.
        let observers = self.observers();
        for (id, listener) in &observers.listeners {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| listener(active.as_ref())));
            if let Err(payload) = delivered {
                tracing::warn!(
                    subscription = *id,
                    panic = %panic_message(&*payload),
                    "playback listener panicked"
                );
            }
        }
    }
}

enum Command {
    Play(Sample),
    Toggle(Sample),
    Stop,
}

struct Job {
    command: Command,
    reply: Sender<Result<(), SoundrawError>>,
}

#[must_use = "call wait() to observe the outcome, or drop it to fire and forget"]
pub struct Pending {
    reply: Receiver<Result<(), SoundrawError>>,
}

impl Pending {
    fn ready(result: Result<(), SoundrawError>) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { reply: rx }
    }

    pub fn wait(self) -> Result<(), SoundrawError> {
        self.reply
            .recv()
            .unwrap_or(Err(SoundrawError::PlaybackClosed))
    }

    pub fn poll(&self) -> Option<Result<(), SoundrawError>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SoundrawError::PlaybackClosed)),
        }
    }
}

pub struct PlaybackCoordinator {
    queue: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl PlaybackCoordinator {
    pub fn new<F, P>(
        downloader: Arc<Downloader<F>>,
        player: P,
        scratch_dir: Utf8PathBuf,
    ) -> Result<Self, SoundrawError>
    where
        F: Fetcher + 'static,
        P: Player,
    {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = Worker {
            downloader,
            player,
            scratch_dir,
            shared: Arc::clone(&shared),
            live_file: RefCell::new(None),
        };
        let handle = thread::Builder::new()
            .name("soundraw-playback".to_string())
            .spawn(move || worker.run(rx))
            .map_err(|err| SoundrawError::Automation(format!("spawn playback worker: {err}")))?;

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            shared,
        })
    }

    pub fn play(&self, sample: &Sample) -> Pending {
        self.enqueue(Command::Play(sample.clone()))
    }

    pub fn toggle(&self, sample: &Sample) -> Pending {
        self.enqueue(Command::Toggle(sample.clone()))
    }

    pub fn stop(&self) -> Pending {
        self.enqueue(Command::Stop)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state().clone()
    }

    pub fn active_sample(&self) -> Option<SampleId> {
        self.shared.state().active_sample().cloned()
    }

    // Listeners run on the worker thread and must not (un)subscribe re-entrantly.
    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: Fn(Option<&SampleId>) + Send + Sync + 'static,
    {
        let mut observers = self.shared.observers();
        let current = self.shared.state().active_sample().cloned();
        listener(current.as_ref());
        observers.next_id += 1;
        let id = observers.next_id;
        observers.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.shared.observers();
        let before = observers.listeners.len();
        observers.listeners.retain(|(existing, _)| *existing != id);
        observers.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.observers().listeners.len()
    }

    pub fn shutdown(&self) {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                tracing::warn!("playback shutdown requested from the playback worker");
            } else if handle.join().is_err() {
                tracing::warn!("playback worker panicked");
            }
        }

        self.shared.observers().listeners.clear();
    }

    fn enqueue(&self, command: Command) -> Pending {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let closed = match command {
            Command::Stop => Ok(()),
            Command::Play(_) | Command::Toggle(_) => Err(SoundrawError::PlaybackClosed),
        };
        let Some(sender) = queue.as_ref() else {
            return Pending::ready(closed);
        };
        let (reply, rx) = mpsc::channel();
        if sender.send(Job { command, reply }).is_err() {
            return Pending::ready(closed);
        }
        Pending { reply: rx }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<F: Fetcher, P: Player> {
    downloader: Arc<Downloader<F>>,
    player: P,
    scratch_dir: Utf8PathBuf,
    shared: Arc<Shared>,
    // Scratch file backing the current Starting/Playing session.
    live_file: RefCell<Option<Utf8PathBuf>>,
}

impl<F: Fetcher, P: Player> Worker<F, P> {
    fn run(self, jobs: Receiver<Job>) {
        for job in jobs {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(job.command)));
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::warn!(panic = %message, "playback job panicked; resetting to idle");
                    self.reset_after_panic();
                    Err(SoundrawError::Automation(format!(
                        "playback job panicked: {message}"
                    )))
                }
            };
            if let Err(err) = &result {
                tracing::warn!(error = %err, "playback request failed");
            }
            // The caller may have dropped its handle; that is fine.
            let _ = job.reply.send(result);
        }
        if panic::catch_unwind(AssertUnwindSafe(|| self.stop_current())).is_err() {
            self.reset_after_panic();
        }
    }

    fn execute(&self, command: Command) -> Result<(), SoundrawError> {
        match command {
            Command::Play(sample) => self.play(sample),
            Command::Toggle(sample) => {
                if self.shared.state().active_sample() == Some(&sample.id) {
                    self.stop_current();
                    Ok(())
                } else {
                    self.play(sample)
                }
            }
            Command::Stop => {
                self.stop_current();
                Ok(())
            }
        }
    }

    fn reset_after_panic(&self) {
        if let Some(path) = self.live_file.borrow_mut().take() {
            self.discard(&path);
        }
        self.shared.transition(PlaybackState::Idle);
    }

    fn play(&self, sample: Sample) -> Result<(), SoundrawError> {
        let already_playing = self
            .shared
            .state()
            .session()
            .is_some_and(|session| session.sample_id == sample.id);
        if already_playing {
            return Ok(());
        }

        self.stop_current();
        self.shared
            .transition(PlaybackState::Starting(sample.id.clone()));

        let file = match self
            .downloader
            .get_or_fetch(&sample.url, &self.scratch_dir, &sample.name)
        {
            Ok(file) => file,
            Err(err) => {
                self.shared.transition(PlaybackState::Idle);
                return Err(err);
            }
        };
        *self.live_file.borrow_mut() = Some(file.path.clone());

        if let Err(err) = self.player.open_and_loop(&file.path) {
            self.live_file.borrow_mut().take();
            self.discard(&file.path);
            self.shared.transition(PlaybackState::Idle);
            return Err(err);
        }

        tracing::info!(sample = %sample.id, path = %file.path, "playing sample");
        self.shared
            .transition(PlaybackState::Playing(PlaybackSession {
                sample_id: sample.id,
                temp_path: file.path,
            }));
        Ok(())
    }

    fn stop_current(&self) {
        let session = match &*self.shared.state() {
            PlaybackState::Idle => return,
            PlaybackState::Playing(session) => Some(session.clone()),
            PlaybackState::Starting(_) | PlaybackState::Stopping => None,
        };

        self.shared.transition(PlaybackState::Stopping);
        if let Err(err) = self.player.close() {
            tracing::warn!(error = %err, "failed to close player; continuing cleanup");
        }
        if let Some(session) = session {
            tracing::info!(sample = %session.sample_id, "stopped sample");
            self.discard(&session.temp_path);
        }
        self.live_file.borrow_mut().take();
        self.shared.transition(PlaybackState::Idle);
    }

    fn discard(&self, path: &Utf8Path) {
        if let Err(err) = Store::remove_file_if_exists(path) {
            tracing::warn!(error = %err, "failed to remove playback file");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
