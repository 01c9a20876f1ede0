//! Transform flattening.
//!
//! COLLADA nodes carry transform elements as siblings of their content;
//! the output tree expresses them as nesting wrapper nodes instead. A
//! [`TransformStack`] defers each transform element until the first
//! structural child needs it, then opens the deferred wrappers newest
//! first, so the transform declared last sits outermost.

use xmltree::Element;

use crate::collada::parser::ColladaParser;
use crate::dom;
use crate::scene::{NodeBody, SceneNode, Xyz};

/// The transform element kinds a node may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    Matrix,
    Translate,
    Rotate,
    Scale,
    LookAt,
}

impl TransformKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "matrix" => Some(TransformKind::Matrix),
            "translate" => Some(TransformKind::Translate),
            "rotate" => Some(TransformKind::Rotate),
            "scale" => Some(TransformKind::Scale),
            "lookat" => Some(TransformKind::LookAt),
            _ => None,
        }
    }
}

/// Deferred transform elements of the node currently being parsed.
#[derive(Debug, Default)]
pub struct TransformStack<'a> {
    pending: Vec<&'a Element>,
    opened: usize,
}

impl<'a> TransformStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: &'a Element) {
        self.pending.push(element);
    }

    fn unopened(&self) -> std::ops::Range<usize> {
        self.opened..self.pending.len()
    }
}

impl<'a> ColladaParser<'a> {
    /// Open every transform deferred since the last structural child,
    /// newest first.
    pub(super) fn open_pending_transforms(&mut self, stack: &mut TransformStack<'a>) {
        for i in stack.unopened().rev() {
            self.open_transform(stack.pending[i]);
        }
        stack.opened = stack.pending.len();
    }

    /// Close every wrapper the stack opened over the node's lifetime.
    pub(super) fn close_transforms(&mut self, stack: &TransformStack<'a>) {
        for _ in 0..stack.opened {
            self.builder.close();
        }
    }

    fn open_transform(&mut self, element: &Element) {
        let Some(kind) = TransformKind::from_tag(&element.name) else {
            return;
        };

        let values = dom::parse_float_array(element);
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);

        let id = self.make_id(dom::attr(element, "id"));
        let sid = match dom::attr(element, "sid") {
            Some(sid) => sid.to_string(),
            // lookAt keeps a well-known scoped id so viewers can find it.
            None if kind == TransformKind::LookAt => "lookat".to_string(),
            None => self.random_sid(),
        };

        let (tag, body) = match kind {
            TransformKind::Translate => (
                "translate",
                NodeBody::Translate {
                    x: at(0),
                    y: at(1),
                    z: at(2),
                },
            ),
            TransformKind::Scale => (
                "scale",
                NodeBody::Scale {
                    x: at(0),
                    y: at(1),
                    z: at(2),
                },
            ),
            TransformKind::Rotate => (
                "rotate",
                NodeBody::Rotate {
                    x: at(0),
                    y: at(1),
                    z: at(2),
                    angle: at(3),
                },
            ),
            TransformKind::Matrix => (
                "matrix",
                // Row-major document order becomes column-major elements.
                NodeBody::Matrix {
                    elements: vec![
                        at(0), at(4), at(8), at(12),
                        at(1), at(5), at(9), at(13),
                        at(2), at(6), at(10), at(14),
                        at(3), at(7), at(11), at(15),
                    ],
                },
            ),
            TransformKind::LookAt => (
                "lookAt",
                NodeBody::LookAt {
                    eye: Xyz::new(at(0), at(1), at(2)),
                    look: Xyz::new(at(3), at(4), at(5)),
                    up: Xyz::new(at(6), at(7), at(8)),
                },
            ),
        };

        self.builder.open(
            SceneNode::new(tag)
                .with_id(id)
                .with_sid(Some(sid))
                .with_body(body),
        );
        self.add_info(tag);
    }
}
