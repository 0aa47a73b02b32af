//! Root component: heading, timer, instructions, credits and the completion
//! sound.

use std::fmt;
use std::rc::Rc;

use tracing::{info, warn};

use super::how_to::HowTo;
use super::timer::{Timer, TimerProps, TIMER_CONFIG_KEY, TIMER_END};
use crate::audio::{AudioSink, NullSink};
use crate::config::TimerConfig;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::runtime::{
    claim_element, claim_space, detach_if, set_context, Component, ComponentEvent, ComponentRef,
    DirtySet, Fragment, Scope, Slot,
};

pub const COMPLETION_SOUND: &str = "sounds/oh-yeah.wav";

const CREDITS: &[(&str, &str)] = &[
    (
        "https://www.who.int/gpsc/clean_hands_protection/en/",
        "Picture Source",
    ),
    (
        "https://freesound.org/people/metrostock99/sounds/345086/",
        "Sound Source",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSlot {
    Audio,
}

impl Slot for AppSlot {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        0
    }
}

#[derive(Default)]
pub struct AppProps {
    /// Where the completion sound goes. Silent when unset.
    pub sink: Option<Rc<dyn AudioSink>>,
    /// Countdown settings handed to the timer. Falls back to the host config.
    pub timer: Option<TimerConfig>,
}

impl fmt::Debug for AppProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppProps")
            .field("sink", &self.sink.is_some())
            .field("timer", &self.timer)
            .finish()
    }
}

pub struct App {
    audio: Option<NodeId>,
    sink: Rc<dyn AudioSink>,
}

impl App {
    /// The bound `<audio>` element, once the binding phase has run.
    pub fn audio(&self) -> Option<NodeId> {
        self.audio
    }

    fn play_audio(scope: &Scope<Self>, event: &ComponentEvent) {
        info!(event = %event.name, detail = %event.detail, "playing completion sound");
        let Some((audio, sink)) = scope.with(|app| (app.audio, Rc::clone(&app.sink))) else {
            return;
        };
        let Some(audio) = audio else {
            warn!("audio element not bound yet");
            return;
        };
        let doc = scope.document();
        let source = doc
            .find(audio, "source")
            .and_then(|source| doc.attribute(source, "src"));
        sink.play(source.as_deref().unwrap_or(COMPLETION_SOUND));
    }
}

impl Component for App {
    type Props = AppProps;
    type Slot = AppSlot;

    fn create(props: AppProps, scope: &Scope<Self>) -> Result<Self> {
        let timer = props
            .timer
            .unwrap_or_else(|| scope.host().config().timer.clone());
        set_context(TIMER_CONFIG_KEY, timer)?;
        Ok(Self {
            audio: None,
            sink: props.sink.unwrap_or_else(|| Rc::new(NullSink)),
        })
    }

    fn fragment(&self, scope: &Scope<Self>) -> Result<Box<dyn Fragment<Self>>> {
        let timer = scope.child::<Timer>(TimerProps::default())?;
        let play_scope = scope.clone();
        timer.on(TIMER_END, move |event| App::play_audio(&play_scope, event));
        let how_to = scope.child::<HowTo>(())?;

        Ok(Box::new(AppFragment {
            scope: scope.clone(),
            document: scope.document().clone(),
            timer,
            how_to,
            nodes: None,
            current: false,
        }))
    }
}

struct AppNodes {
    title: NodeId,
    after_title: NodeId,
    after_timer: NodeId,
    after_how_to: NodeId,
    credits: NodeId,
    after_credits: NodeId,
    audio: NodeId,
}

struct AppFragment {
    scope: Scope<App>,
    document: Document,
    timer: ComponentRef<Timer>,
    how_to: ComponentRef<HowTo>,
    nodes: Option<AppNodes>,
    current: bool,
}

impl AppFragment {
    fn fill(&self, nodes: &AppNodes) {
        let doc = &self.document;
        if doc.children(nodes.title).is_empty() {
            doc.append(nodes.title, doc.create_text("Handwashing App"));
        }
        if doc.children(nodes.credits).is_empty() {
            for (index, (href, label)) in CREDITS.iter().enumerate() {
                if index > 0 {
                    doc.append(nodes.credits, doc.space());
                }
                let link = doc.create_element("a");
                doc.set_attribute(link, "href", Some(*href));
                doc.append(link, doc.create_text(*label));
                doc.append(nodes.credits, link);
            }
        }
        if doc.children(nodes.audio).is_empty() {
            let source = doc.create_element("source");
            doc.set_attribute(source, "src", Some(COMPLETION_SOUND));
            doc.append(nodes.audio, source);
        }
    }
}

impl Fragment<App> for AppFragment {
    fn create(&mut self) {
        let doc = &self.document;
        let title = doc.create_element("h1");
        let after_title = doc.space();
        self.timer.create_fragment();
        let after_timer = doc.space();
        self.how_to.create_fragment();
        let after_how_to = doc.space();
        let credits = doc.create_element("h3");
        let after_credits = doc.space();
        let audio = doc.create_element("audio");

        let nodes = AppNodes {
            title,
            after_title,
            after_timer,
            after_how_to,
            credits,
            after_credits,
            audio,
        };
        self.fill(&nodes);
        self.nodes = Some(nodes);
    }

    fn claim(&mut self, nodes: &mut Vec<NodeId>) {
        let doc = self.document.clone();
        let title = claim_element(&doc, nodes, "h1");
        let after_title = claim_space(&doc, nodes);
        self.timer.claim(nodes);
        let after_timer = claim_space(&doc, nodes);
        self.how_to.claim(nodes);
        let after_how_to = claim_space(&doc, nodes);
        let credits = claim_element(&doc, nodes, "h3");
        let after_credits = claim_space(&doc, nodes);
        let audio = claim_element(&doc, nodes, "audio");

        let claimed = AppNodes {
            title,
            after_title,
            after_timer,
            after_how_to,
            credits,
            after_credits,
            audio,
        };
        self.fill(&claimed);
        self.nodes = Some(claimed);
    }

    fn mount(&mut self, target: NodeId, anchor: Option<NodeId>) {
        let Some(nodes) = &self.nodes else {
            return;
        };
        let doc = &self.document;
        doc.insert(target, nodes.title, anchor);
        doc.insert(target, nodes.after_title, anchor);
        self.timer.mount(target, anchor);
        doc.insert(target, nodes.after_timer, anchor);
        self.how_to.mount(target, anchor);
        doc.insert(target, nodes.after_how_to, anchor);
        doc.insert(target, nodes.credits, anchor);
        doc.insert(target, nodes.after_credits, anchor);
        doc.insert(target, nodes.audio, anchor);
        self.scope
            .bind_this(AppSlot::Audio, |app| &mut app.audio, Some(nodes.audio));
        self.current = true;
    }

    fn patch(&mut self, _state: &App, _dirty: &DirtySet) {}

    fn intro(&mut self, local: bool) {
        if self.current {
            return;
        }
        self.timer.transition_in(local);
        self.how_to.transition_in(local);
        self.current = true;
    }

    fn outro(&mut self, local: bool) {
        self.timer.transition_out(local, false, None);
        self.how_to.transition_out(local, false, None);
        self.current = false;
    }

    fn destroy(&mut self, detaching: bool) {
        let Some(nodes) = self.nodes.take() else {
            return;
        };
        let doc = &self.document;
        detach_if(doc, nodes.title, detaching);
        detach_if(doc, nodes.after_title, detaching);
        self.timer.destroy_with(detaching);
        detach_if(doc, nodes.after_timer, detaching);
        self.how_to.destroy_with(detaching);
        detach_if(doc, nodes.after_how_to, detaching);
        detach_if(doc, nodes.credits, detaching);
        detach_if(doc, nodes.after_credits, detaching);
        detach_if(doc, nodes.audio, detaching);
        self.scope.bind_this(AppSlot::Audio, |app| &mut app.audio, None);
    }
}
