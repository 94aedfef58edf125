//! Darwin notify center transport (Apple platforms)
//!
//! `CFNotificationCenterGetDarwinNotifyCenter` is the only notification center
//! that crosses the app/extension sandbox boundary. It drops `object` and
//! `userInfo`, so the observer pointer is the only thing we get back: it
//! carries the registry token to [`crate::deliver_signal`].

use crate::interface::SignalTransport;
use core_foundation::base::{Boolean, CFIndex, TCFType};
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::c_void;
use std::sync::Arc;

type CFNotificationCenterRef = *mut c_void;
type CFDictionaryRef = *const c_void;

type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFDictionaryRef,
);

/// `CFNotificationSuspensionBehaviorDeliverImmediately`
const DELIVER_IMMEDIATELY: CFIndex = 4;

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFNotificationCenterGetDarwinNotifyCenter() -> CFNotificationCenterRef;

    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        call_back: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: CFIndex,
    );

    fn CFNotificationCenterRemoveEveryObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
    );

    fn CFNotificationCenterPostNotification(
        center: CFNotificationCenterRef,
        name: CFStringRef,
        object: *const c_void,
        user_info: CFDictionaryRef,
        deliver_immediately: Boolean,
    );
}

extern "C" fn darwin_trampoline(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: CFDictionaryRef,
) {
    crate::signal::deliver_signal(observer as usize as u64);
}

fn token_pointer(token: u64) -> *const c_void {
    token as usize as *const c_void
}

/// `SignalTransport` over the system-wide Darwin notify center
#[derive(Debug, Default)]
pub struct DarwinNotifyTransport;

impl SignalTransport for DarwinNotifyTransport {
    fn post(&self, name: String) {
        let name = CFString::new(&name);
        unsafe {
            CFNotificationCenterPostNotification(
                CFNotificationCenterGetDarwinNotifyCenter(),
                name.as_concrete_TypeRef(),
                std::ptr::null(),
                std::ptr::null(),
                1,
            );
        }
    }

    fn add_observer(&self, name: String, token: u64) {
        let name = CFString::new(&name);
        unsafe {
            CFNotificationCenterAddObserver(
                CFNotificationCenterGetDarwinNotifyCenter(),
                token_pointer(token),
                darwin_trampoline,
                name.as_concrete_TypeRef(),
                std::ptr::null(),
                DELIVER_IMMEDIATELY,
            );
        }
    }

    fn remove_observer(&self, token: u64) {
        unsafe {
            CFNotificationCenterRemoveEveryObserver(
                CFNotificationCenterGetDarwinNotifyCenter(),
                token_pointer(token),
            );
        }
    }
}

#[uniffi::export]
pub fn new_darwin_transport() -> Arc<dyn SignalTransport> {
    Arc::new(DarwinNotifyTransport)
}
