//! 反馈分发器 - 把通知生命周期事件翻译成 play/stop 调用
//!
//! 每条通知最多绑定一组正在播放的效果。每次 add 先停掉上一组再播放新的，
//! remove 停掉剩下的。

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::{
    EffectHandle, FeedbackBackend, Properties, StopTarget, PROP_MEDIA_AUDIO, PROP_MEDIA_LEDS,
    PROP_MEDIA_VIBRA, PROP_SOUND_ENABLED, PROP_SOUND_FILENAME,
};
use super::policy::{self, SuppressionMode};
use crate::notification::record::{
    NotificationId, NotificationRecord, HINT_LED_DISABLED_WITHOUT_BODY_AND_SUMMARY,
    HINT_ORIGIN_PACKAGE, HINT_SOUND_FILE, HINT_SUPPRESS_SOUND, HINT_VIBRA,
};
use crate::notification::store::NotificationStore;
use crate::window::WindowSuppressionSource;

/// 明确振动请求播放的效果名
pub const VIBRA_EFFECT: &str = "vibra";

const FILE_URI_PREFIX: &str = "file://";

/// 一次 add 处理的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 进度更新，已有绑定保持不动
    ProgressIgnored,
    /// 旧绑定已停掉，随后开始播放这些效果
    Played { effects: Vec<String>, vibra: bool },
}

impl DispatchOutcome {
    /// 没有开始播放任何新效果
    pub fn is_silent(&self) -> bool {
        match self {
            DispatchOutcome::ProgressIgnored => true,
            DispatchOutcome::Played { effects, vibra } => effects.is_empty() && !vibra,
        }
    }
}

/// 一条通知在给定阈值和窗口模式下要播放的内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackPlan {
    /// feedback hint 中通过策略检查的效果
    pub effects: Vec<String>,
    /// 随 `effects` 一起传给后端的属性
    pub properties: Properties,
    /// 是否播放明确请求的振动
    pub vibra: bool,
}

impl FeedbackPlan {
    /// 什么都不播放
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && !self.vibra
    }
}

/// 计算一条通知要播放的效果、属性和振动
///
/// 进度更新得到空计划。feedback 效果受最低优先级和窗口模式限制，
/// 振动只受窗口模式限制。`mode` 由调用方读取一次后传入。
pub fn plan_feedback(
    record: &NotificationRecord,
    minimum_priority: i32,
    mode: Option<SuppressionMode>,
) -> FeedbackPlan {
    let mut plan = FeedbackPlan::default();
    if record.has_progress {
        return plan;
    }

    let items = record.feedback_items();
    if !items.is_empty() && policy::is_enabled(record, minimum_priority, mode) {
        plan.properties = feedback_properties(record);
        plan.effects = items;
    }

    // 明确请求的振动不受优先级限制
    plan.vibra = record.hints.bool_or(HINT_VIBRA, false) && policy::is_enabled(record, 0, mode);
    plan
}

/// 反馈分发器
pub struct FeedbackDispatcher {
    store: Arc<dyn NotificationStore>,
    window: Arc<dyn WindowSuppressionSource>,
    backend: Arc<dyn FeedbackBackend>,
    /// 通知 -> 正在为它播放的句柄
    bindings: HashMap<NotificationId, Vec<EffectHandle>>,
    minimum_priority: i32,
}

impl FeedbackDispatcher {
    /// 创建分发器，最低优先级为 0
    pub fn new(
        store: Arc<dyn NotificationStore>,
        window: Arc<dyn WindowSuppressionSource>,
        backend: Arc<dyn FeedbackBackend>,
    ) -> Self {
        Self {
            store,
            window,
            backend,
            bindings: HashMap::new(),
            minimum_priority: 0,
        }
    }

    /// 设置初始最低优先级
    pub fn with_minimum_priority(mut self, minimum_priority: i32) -> Self {
        self.minimum_priority = minimum_priority;
        self
    }

    /// 使用的后端
    pub fn backend(&self) -> &Arc<dyn FeedbackBackend> {
        &self.backend
    }

    /// 当前最低优先级
    pub fn minimum_priority(&self) -> i32 {
        self.minimum_priority
    }

    /// 修改之后判断用的阈值，不影响正在播放的反馈
    pub fn set_minimum_priority(&mut self, minimum_priority: i32) {
        if self.minimum_priority != minimum_priority {
            info!(
                old = self.minimum_priority,
                new = minimum_priority,
                "Minimum feedback priority changed"
            );
        }
        self.minimum_priority = minimum_priority;
    }

    /// 按当前窗口状态做策略判断
    pub fn is_enabled(&self, record: &NotificationRecord, minimum_priority: i32) -> bool {
        policy::is_enabled(record, minimum_priority, self.window.current_suppression_mode())
    }

    /// store 回调：新增通知
    pub fn on_added(&mut self, id: NotificationId) -> Option<DispatchOutcome> {
        let Some(record) = self.store.notification(id) else {
            debug!(id = %id, "Added notification not in store, ignoring");
            return None;
        };
        Some(self.add_notification(&record))
    }

    /// store 回调：通知更新，与新增完全相同
    pub fn on_updated(&mut self, id: NotificationId) -> Option<DispatchOutcome> {
        self.on_added(id)
    }

    /// store 回调：通知即将删除
    pub fn on_removed(&mut self, id: NotificationId) {
        let stopped = self.teardown(id);
        if stopped > 0 {
            debug!(id = %id, stopped, "Feedback stopped for removed notification");
        }
    }

    /// 用 `record` 现在要求的反馈替换它已绑定的反馈
    pub fn add_notification(&mut self, record: &NotificationRecord) -> DispatchOutcome {
        // 进度更新不播放反馈，也不打断已有反馈
        if record.has_progress {
            debug!(id = %record.id, "Progress update, feedback skipped");
            return DispatchOutcome::ProgressIgnored;
        }

        self.teardown(record.id);

        // 每次 add 只读一次窗口模式
        let mode = self.window.current_suppression_mode();
        let plan = plan_feedback(record, self.minimum_priority, mode);

        let mut handles = Vec::new();
        for item in &plan.effects {
            self.backend.stop(StopTarget::effect(item.as_str()));
            handles.push(self.backend.play(item, &plan.properties));
        }
        if plan.vibra {
            self.backend.stop(StopTarget::effect(VIBRA_EFFECT));
            handles.push(self.backend.play(VIBRA_EFFECT, &Properties::new()));
        }

        if !handles.is_empty() {
            self.bindings.insert(record.id, handles);
        }

        let outcome = DispatchOutcome::Played {
            effects: plan.effects,
            vibra: plan.vibra,
        };
        debug!(
            id = %record.id,
            mode = %mode.unwrap_or_default(),
            minimum_priority = self.minimum_priority,
            ?outcome,
            "Notification feedback dispatched"
        );
        outcome
    }

    /// 当前绑定到 `id` 的句柄
    pub fn bound_handles(&self, id: NotificationId) -> &[EffectHandle] {
        self.bindings.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 有反馈在播放的通知数
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// 停掉并忘记 `id` 绑定的所有句柄，返回停掉的数量
    fn teardown(&mut self, id: NotificationId) -> usize {
        let Some(handles) = self.bindings.remove(&id) else {
            return 0;
        };
        for handle in &handles {
            self.backend.stop(StopTarget::Handle(*handle));
        }
        handles.len()
    }
}

/// 由通知 hints 和文本得出的播放属性
pub fn feedback_properties(record: &NotificationRecord) -> Properties {
    let mut properties = Properties::new();
    let hints = &record.hints;

    if hints.bool_or(HINT_LED_DISABLED_WITHOUT_BODY_AND_SUMMARY, true)
        && record.body.is_empty()
        && record.summary.is_empty()
    {
        properties.insert(PROP_MEDIA_LEDS.to_string(), false.into());
    }
    if hints.bool_or(HINT_SUPPRESS_SOUND, false) {
        properties.insert(PROP_MEDIA_AUDIO.to_string(), false.into());
    }
    // 外部来源（Android）的通知只通过振动 hint 振动
    if !hints.string(HINT_ORIGIN_PACKAGE).is_empty() {
        properties.insert(PROP_MEDIA_VIBRA.to_string(), false.into());
    }

    let sound_file = hints.string(HINT_SOUND_FILE);
    if !sound_file.is_empty() {
        let sound_file = sound_file.strip_prefix(FILE_URI_PREFIX).unwrap_or(&sound_file);
        properties.insert(PROP_SOUND_FILENAME.to_string(), sound_file.into());
        properties.insert(PROP_SOUND_ENABLED.to_string(), true.into());
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::record::{HINT_DISPLAY_ON, HINT_FEEDBACK};
    use crate::notification::store::MemoryStore;
    use crate::window::FixedSuppressionMode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play(String, EffectHandle, Properties),
        StopHandle(EffectHandle),
        StopEffect(String),
    }

    /// 测试用的 mock 后端
    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<Call>>,
        next: Mutex<u32>,
    }

    impl MockBackend {
        fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[async_trait]
    impl FeedbackBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn play(&self, effect: &str, properties: &Properties) -> EffectHandle {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            let handle = EffectHandle(*next);
            self.calls
                .lock()
                .unwrap()
                .push(Call::Play(effect.to_string(), handle, properties.clone()));
            handle
        }

        fn stop(&self, target: StopTarget) {
            let call = match target {
                StopTarget::Handle(h) => Call::StopHandle(h),
                StopTarget::Effect(name) => Call::StopEffect(name),
            };
            self.calls.lock().unwrap().push(call);
        }
    }

    /// 第一次返回 AllEnabled，之后都返回 AllDisabled，并记录调用次数
    #[derive(Default)]
    struct ChangingWindow {
        calls: AtomicUsize,
    }

    impl WindowSuppressionSource for ChangingWindow {
        fn current_suppression_mode(&self) -> Option<SuppressionMode> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Some(SuppressionMode::AllEnabled)
            } else {
                Some(SuppressionMode::AllDisabled)
            }
        }
    }

    fn setup(mode: Option<SuppressionMode>) -> (FeedbackDispatcher, Arc<MemoryStore>, Arc<MockBackend>) {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        let dispatcher = FeedbackDispatcher::new(
            store.clone(),
            Arc::new(FixedSuppressionMode(mode)),
            backend.clone(),
        );
        (dispatcher, store, backend)
    }

    fn ringtone_record() -> NotificationRecord {
        NotificationRecord::new(1)
            .with_priority(5)
            .with_urgency(1)
            .with_hint(HINT_FEEDBACK, "ringtone,alert")
    }

    fn played_names(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Play(name, _, _) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_add_plays_each_effect_after_stop() {
        let (mut dispatcher, _store, backend) = setup(Some(SuppressionMode::AllEnabled));
        let outcome = dispatcher.add_notification(&ringtone_record());

        let calls = backend.take_calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Call::StopEffect("ringtone".into()));
        assert!(matches!(&calls[1], Call::Play(name, _, _) if name == "ringtone"));
        assert_eq!(calls[2], Call::StopEffect("alert".into()));
        assert!(matches!(&calls[3], Call::Play(name, _, _) if name == "alert"));

        assert_eq!(
            outcome,
            DispatchOutcome::Played {
                effects: vec!["ringtone".into(), "alert".into()],
                vibra: false
            }
        );
        assert_eq!(dispatcher.bound_handles(NotificationId(1)).len(), 2);
    }

    #[test]
    fn test_repeated_add_stops_previous_handles_first() {
        let (mut dispatcher, _store, backend) = setup(None);
        let record = ringtone_record();
        dispatcher.add_notification(&record);
        let first: Vec<EffectHandle> = dispatcher.bound_handles(record.id).to_vec();
        backend.take_calls();

        dispatcher.add_notification(&record);
        let calls = backend.take_calls();

        let first_play = calls
            .iter()
            .position(|c| matches!(c, Call::Play(..)))
            .unwrap();
        for handle in &first {
            let stop = calls
                .iter()
                .position(|c| *c == Call::StopHandle(*handle))
                .unwrap();
            assert!(stop < first_play);
        }
        assert_eq!(played_names(&calls), vec!["ringtone", "alert"]);
        assert_eq!(dispatcher.binding_count(), 1);
    }

    #[test]
    fn test_progress_update_plays_nothing_and_keeps_binding() {
        let (mut dispatcher, _store, backend) = setup(None);
        let record = ringtone_record();
        dispatcher.add_notification(&record);
        let bound = dispatcher.bound_handles(record.id).to_vec();
        backend.take_calls();

        let progress = record.clone().with_progress(true).with_hint(HINT_VIBRA, true);
        assert_eq!(dispatcher.add_notification(&progress), DispatchOutcome::ProgressIgnored);
        assert!(backend.take_calls().is_empty());
        assert_eq!(dispatcher.bound_handles(record.id), bound.as_slice());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut dispatcher, _store, backend) = setup(None);
        dispatcher.add_notification(&ringtone_record());
        let bound = dispatcher.bound_handles(NotificationId(1)).to_vec();
        backend.take_calls();

        dispatcher.on_removed(NotificationId(1));
        let calls = backend.take_calls();
        assert_eq!(calls.len(), 2);
        for handle in bound {
            assert!(calls.contains(&Call::StopHandle(handle)));
        }

        dispatcher.on_removed(NotificationId(1));
        assert!(backend.take_calls().is_empty());
        assert_eq!(dispatcher.binding_count(), 0);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (mut dispatcher, _store, backend) = setup(None);
        dispatcher.on_removed(NotificationId(99));
        assert!(backend.take_calls().is_empty());
    }

    #[test]
    fn test_vibra_bypasses_priority() {
        let (mut dispatcher, _store, backend) = setup(Some(SuppressionMode::AllEnabled));
        dispatcher.set_minimum_priority(10);
        let record = NotificationRecord::new(4)
            .with_hint(HINT_VIBRA, true)
            .with_hint(HINT_FEEDBACK, "");

        let outcome = dispatcher.add_notification(&record);
        let calls = backend.take_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::StopEffect(VIBRA_EFFECT.into()));
        assert!(matches!(&calls[1], Call::Play(name, _, props) if name == VIBRA_EFFECT && props.is_empty()));
        assert_eq!(outcome, DispatchOutcome::Played { effects: vec![], vibra: true });
    }

    #[test]
    fn test_vibra_still_respects_window_mode() {
        let (mut dispatcher, _store, backend) = setup(Some(SuppressionMode::AllDisabled));
        let record = NotificationRecord::new(4).with_hint(HINT_VIBRA, true);
        assert!(dispatcher.add_notification(&record).is_silent());
        assert!(backend.take_calls().is_empty());
    }

    #[test]
    fn test_priority_filter_blocks_feedback_but_teardown_happens() {
        let (mut dispatcher, _store, backend) = setup(None);
        let record = ringtone_record();
        dispatcher.add_notification(&record);
        backend.take_calls();

        dispatcher.set_minimum_priority(6);
        let outcome = dispatcher.add_notification(&record);
        let calls = backend.take_calls();
        assert!(outcome.is_silent());
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| matches!(c, Call::StopHandle(_))));
        assert!(dispatcher.bound_handles(record.id).is_empty());
    }

    #[test]
    fn test_system_disabled_scenarios() {
        let (mut dispatcher, _store, backend) = setup(Some(SuppressionMode::SystemDisabled));
        dispatcher.add_notification(&ringtone_record());
        assert_eq!(played_names(&backend.take_calls()), vec!["ringtone", "alert"]);

        let urgent = ringtone_record().with_urgency(3);
        dispatcher.add_notification(&urgent);
        assert!(played_names(&backend.take_calls()).is_empty());
    }

    #[test]
    fn test_on_added_reads_from_store() {
        let (mut dispatcher, store, backend) = setup(None);
        assert_eq!(dispatcher.on_added(NotificationId(1)), None);

        store.upsert(ringtone_record());
        assert!(dispatcher.on_added(NotificationId(1)).is_some());
        assert_eq!(played_names(&backend.take_calls()), vec!["ringtone", "alert"]);

        store.upsert(ringtone_record().with_hint(HINT_FEEDBACK, "chat"));
        dispatcher.on_updated(NotificationId(1));
        assert_eq!(played_names(&backend.take_calls()), vec!["chat"]);
    }

    #[test]
    fn test_is_enabled_uses_window_source() {
        let (dispatcher, _store, _backend) = setup(Some(SuppressionMode::ApplicationDisabled));
        assert!(!dispatcher.is_enabled(&ringtone_record(), 0));
        assert!(dispatcher.is_enabled(&ringtone_record().with_hint(HINT_DISPLAY_ON, true), 0));
    }

    #[test]
    fn test_properties_led_disabled_without_text() {
        let record = NotificationRecord::new(1);
        let props = feedback_properties(&record);
        assert_eq!(props.get(PROP_MEDIA_LEDS), Some(&false.into()));

        let with_text = NotificationRecord::new(1).with_text("Hi", "");
        assert!(feedback_properties(&with_text).get(PROP_MEDIA_LEDS).is_none());

        let opted_out = NotificationRecord::new(1)
            .with_hint(HINT_LED_DISABLED_WITHOUT_BODY_AND_SUMMARY, false);
        assert!(feedback_properties(&opted_out).get(PROP_MEDIA_LEDS).is_none());
    }

    #[test]
    fn test_properties_audio_vibra_and_sound_file() {
        let record = NotificationRecord::new(1)
            .with_text("s", "b")
            .with_hint(HINT_SUPPRESS_SOUND, true)
            .with_hint(HINT_ORIGIN_PACKAGE, "com.example.chat")
            .with_hint(HINT_SOUND_FILE, "file:///usr/share/sounds/chat.ogg");
        let props = feedback_properties(&record);

        assert_eq!(props.get(PROP_MEDIA_AUDIO), Some(&false.into()));
        assert_eq!(props.get(PROP_MEDIA_VIBRA), Some(&false.into()));
        assert_eq!(
            props.get(PROP_SOUND_FILENAME),
            Some(&"/usr/share/sounds/chat.ogg".into())
        );
        assert_eq!(props.get(PROP_SOUND_ENABLED), Some(&true.into()));
    }

    #[test]
    fn test_properties_plain_sound_path_kept() {
        let record = NotificationRecord::new(1)
            .with_text("s", "")
            .with_hint(HINT_SOUND_FILE, "/tmp/beep.wav");
        let props = feedback_properties(&record);
        assert_eq!(props.get(PROP_SOUND_FILENAME), Some(&"/tmp/beep.wav".into()));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_properties_passed_to_play() {
        let (mut dispatcher, _store, backend) = setup(None);
        let record = ringtone_record().with_hint(HINT_SUPPRESS_SOUND, true);
        dispatcher.add_notification(&record);
        let calls = backend.take_calls();
        match &calls[1] {
            Call::Play(_, _, props) => {
                assert_eq!(props.get(PROP_MEDIA_AUDIO), Some(&false.into()));
                assert_eq!(props.get(PROP_MEDIA_LEDS), Some(&false.into()));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_window_mode_read_once_per_add() {
        let store = Arc::new(MemoryStore::new());
        let window = Arc::new(ChangingWindow::default());
        let backend = Arc::new(MockBackend::default());
        let mut dispatcher = FeedbackDispatcher::new(store, window.clone(), backend.clone());
        let record = NotificationRecord::new(1)
            .with_hint(HINT_FEEDBACK, "chat")
            .with_hint(HINT_VIBRA, true);

        let outcome = dispatcher.add_notification(&record);
        assert_eq!(window.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome,
            DispatchOutcome::Played {
                effects: vec!["chat".into()],
                vibra: true
            }
        );
        assert_eq!(played_names(&backend.take_calls()), vec!["chat", VIBRA_EFFECT]);

        // 第二次 add 看到的是 AllDisabled，两项判断一起关闭
        assert!(dispatcher.add_notification(&record).is_silent());
        assert_eq!(window.calls.load(Ordering::SeqCst), 2);
        assert!(played_names(&backend.take_calls()).is_empty());
    }

    #[test]
    fn test_plan_feedback() {
        let record = ringtone_record().with_hint(HINT_VIBRA, true);
        let plan = plan_feedback(&record, 0, None);
        assert_eq!(plan.effects, vec!["ringtone", "alert"]);
        assert_eq!(plan.properties, feedback_properties(&record));
        assert!(plan.vibra);

        // 优先级不够时只剩振动，属性也不计算
        let plan = plan_feedback(&record, 10, None);
        assert!(plan.effects.is_empty());
        assert!(plan.properties.is_empty());
        assert!(plan.vibra);

        let plan = plan_feedback(&record, 0, Some(SuppressionMode::AllDisabled));
        assert!(plan.is_empty());

        let progress = record.with_progress(true);
        assert_eq!(plan_feedback(&progress, 0, None), FeedbackPlan::default());
    }
}
