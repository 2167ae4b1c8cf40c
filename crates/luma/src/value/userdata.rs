// Opaque host value with an optional metatable.

use crate::gc::TableId;
use std::any::Any;

pub struct Userdata {
    pub data: Box<dyn Any>,
    pub metatable: Option<TableId>,
}

impl Userdata {
    pub fn new(data: Box<dyn Any>) -> Self {
        Userdata {
            data,
            metatable: None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }
}
