use yew::prelude::*;

/// A simple, styled button.
#[derive(Properties, PartialEq)]
pub struct ButtonProps {
    /// Button label text
    pub label: String,
    /// Click handler
    pub onclick: Callback<MouseEvent>,
    /// Disable state
    #[prop_or_default]
    pub disabled: bool,
}

#[function_component(Button)]
pub fn button(props: &ButtonProps) -> Html {
    html! {
        <button
            type="button"
            onclick={props.onclick.clone()}
            disabled={props.disabled}
            class="ysc-button"
        >
            { &props.label }
        </button>
    }
}

/// Default dialog title.
pub const DEFAULT_MODAL_TITLE: &str = "Payment Confirmation";

/// A dismissible message dialog.
#[derive(Properties, PartialEq)]
pub struct ConfirmationModalProps {
    /// Dialog title
    #[prop_or_else(|| DEFAULT_MODAL_TITLE.to_string())]
    pub title: String,
    /// Message body
    #[prop_or_default]
    pub message: String,
    /// Emitted when the close button is pressed
    pub on_close: Callback<()>,
}

#[function_component(ConfirmationModal)]
pub fn confirmation_modal(props: &ConfirmationModalProps) -> Html {
    let onclick = props.on_close.reform(|_: MouseEvent| ());
    html! {
        <section role="dialog" aria-modal="true" class="ysc-modal">
            <header class="ysc-modal__header">
                <h2>{ &props.title }</h2>
            </header>
            <div class="ysc-modal__body">
                <p>{ &props.message }</p>
            </div>
            <footer class="ysc-modal__footer">
                <Button label="Close" {onclick} />
            </footer>
        </section>
    }
}
