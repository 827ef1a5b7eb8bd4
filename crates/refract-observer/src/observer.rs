use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use refract_core::{Component, ComponentClass, Instance, RenderResult};

use crate::error::ObserverError;
use crate::observer_class::make_class_component_observer;
use crate::shallow::{SameValue, ShallowEq, shallow_equal};

/// What kind of component is being observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentShape {
    Class,
    Function,
    ForwardRef,
    Memo,
}

/// Anything `observer` can be applied to.
pub trait Observe {
    type Component: Component;

    fn shape(&self) -> ComponentShape;

    fn name(&self) -> &str;

    /// Turns `self` into an observed class.
    fn observe(self) -> Result<ComponentClass<Self::Component>, ObserverError>;
}

/// Makes `component` re-render whenever observable data its last render
/// read changes.
///
/// ```rust
/// use refract_core::{Instance, Observable};
/// use refract_observer::{FunctionComponent, FunctionShell, observer, shallow_eq};
/// use std::rc::Rc;
///
/// struct LabelProps {
///     prefix: String,
/// }
/// shallow_eq!(LabelProps { prefix });
///
/// let count = Observable::new(1);
/// let label = FunctionComponent::new("Label", {
///     let count = count.clone();
///     move |props: &LabelProps| Ok(format!("{}{}", props.prefix, count.get()))
/// });
///
/// let class = Rc::new(observer(label).unwrap());
/// let props = LabelProps { prefix: "n = ".to_string() };
/// let instance = Instance::new(&class, FunctionShell::default(), props, ());
/// instance.mount().unwrap();
/// assert_eq!(instance.output().as_deref(), Some("n = 1"));
///
/// count.set(2);
/// assert_eq!(instance.output().as_deref(), Some("n = 2"));
/// ```
pub fn observer<T: Observe>(component: T) -> Result<ComponentClass<T::Component>, ObserverError> {
    log::debug!("observing {:?} '{}'", component.shape(), component.name());
    component.observe()
}

impl<C: Component> Observe for ComponentClass<C>
where
    C::Props: ShallowEq,
    C::State: ShallowEq,
{
    type Component = C;

    fn shape(&self) -> ComponentShape {
        ComponentShape::Class
    }

    fn name(&self) -> &str {
        ComponentClass::name(self)
    }

    fn observe(self) -> Result<ComponentClass<C>, ObserverError> {
        if self.is_injector() {
            log::warn!(
                "{}: observer should be applied before inject, not after it",
                ComponentClass::name(&self)
            );
        }
        make_class_component_observer(self)
    }
}

type FunctionRender<P, O> = Rc<dyn Fn(&P) -> RenderResult<O>>;

/// A render function of props.
pub struct FunctionComponent<P, O> {
    name: String,
    render: FunctionRender<P, O>,
}

impl<P: 'static, O: 'static> FunctionComponent<P, O> {
    pub fn new(name: impl Into<String>, render: impl Fn(&P) -> RenderResult<O> + 'static) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }
}

/// Stateless class a function component runs in once observed.
pub struct FunctionShell<P, O>(PhantomData<fn(P) -> O>);

impl<P, O> Default for FunctionShell<P, O> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<P: 'static, O: Clone + 'static> Component for FunctionShell<P, O> {
    type Props = P;
    type State = ();
    type Output = O;
}

impl<P: ShallowEq + 'static, O: Clone + 'static> Observe for FunctionComponent<P, O> {
    type Component = FunctionShell<P, O>;

    fn shape(&self) -> ComponentShape {
        ComponentShape::Function
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn observe(self) -> Result<ComponentClass<Self::Component>, ObserverError> {
        let render = self.render;
        let class = ComponentClass::new(self.name, move |this: &Instance<FunctionShell<P, O>>| {
            render(&this.props())
        });
        make_class_component_observer(class)
    }
}

/// Ref handed down by a parent; compared by identity.
pub type ForwardedRef = Option<Rc<dyn Any>>;

type ForwardRefRender<P, O> = Rc<dyn Fn(&P, &ForwardedRef) -> RenderResult<O>>;

/// Props of an observed ref-forwarding component.
pub struct RefProps<P> {
    pub props: Rc<P>,
    pub forwarded_ref: ForwardedRef,
}

impl<P> RefProps<P> {
    pub fn new(props: P, forwarded_ref: ForwardedRef) -> Self {
        Self {
            props: Rc::new(props),
            forwarded_ref,
        }
    }
}

impl<P: ShallowEq> ShallowEq for RefProps<P> {
    fn shallow_eq(&self, other: &Self) -> bool {
        shallow_equal(&self.props, &other.props)
            && self.forwarded_ref.same_value(&other.forwarded_ref)
    }
}

/// A render function of props and a forwarded ref.
pub struct ForwardRef<P, O> {
    name: String,
    render: Option<ForwardRefRender<P, O>>,
}

impl<P: 'static, O: 'static> ForwardRef<P, O> {
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&P, &ForwardedRef) -> RenderResult<O> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Some(Rc::new(render)),
        }
    }

    /// A ref-forwarding wrapper that lost its render function.
    pub fn without_render(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            render: None,
        }
    }
}

pub struct ForwardRefShell<P, O>(PhantomData<fn(P) -> O>);

impl<P, O> Default for ForwardRefShell<P, O> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<P: 'static, O: Clone + 'static> Component for ForwardRefShell<P, O> {
    type Props = RefProps<P>;
    type State = ();
    type Output = O;
}

impl<P: ShallowEq + 'static, O: Clone + 'static> Observe for ForwardRef<P, O> {
    type Component = ForwardRefShell<P, O>;

    fn shape(&self) -> ComponentShape {
        ComponentShape::ForwardRef
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn observe(self) -> Result<ComponentClass<Self::Component>, ObserverError> {
        let Some(render) = self.render else {
            return Err(ObserverError::MalformedForwardRef {
                component: self.name,
            });
        };
        let class = ComponentClass::new(self.name, move |this: &Instance<ForwardRefShell<P, O>>| {
            let props = this.props();
            render(&props.props, &props.forwarded_ref)
        });
        make_class_component_observer(class)
    }
}

/// A component already wrapped in memoization.
pub struct Memo<T> {
    inner: T,
}

impl<T: Observe> Memo<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Observe> Observe for Memo<T> {
    type Component = T::Component;

    fn shape(&self) -> ComponentShape {
        ComponentShape::Memo
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn observe(self) -> Result<ComponentClass<T::Component>, ObserverError> {
        Err(ObserverError::AlreadyMemoized {
            component: self.inner.name().to_owned(),
        })
    }
}
